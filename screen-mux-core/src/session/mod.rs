pub mod orchestrator;
pub mod router;
pub mod session_writer;
pub mod track_sink;
