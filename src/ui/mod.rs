pub mod animation;
pub mod prompt;
pub mod render;
