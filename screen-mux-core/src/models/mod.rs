pub mod audio;
pub mod config;
pub mod error;
pub mod media;
pub mod recording_result;
pub mod state;
pub mod video;
