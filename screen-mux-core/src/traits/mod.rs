pub mod audio_input;
pub mod capture_source;
pub mod container_writer;
pub mod permissions;
pub mod session_delegate;
