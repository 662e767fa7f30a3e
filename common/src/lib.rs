pub mod config;
pub mod frame;
pub mod position;
pub mod score;
