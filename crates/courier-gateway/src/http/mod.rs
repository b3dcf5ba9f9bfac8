pub mod relay;
pub mod reply;
