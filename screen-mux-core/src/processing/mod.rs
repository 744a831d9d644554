pub mod frame_validator;
pub mod pcm_adapter;
