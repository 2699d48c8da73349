pub mod constants;
pub mod misc;
pub mod opcodes;
