pub mod metadata;
pub mod mux_format;
pub mod mux_writer;
