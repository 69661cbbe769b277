pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod player;
pub mod queue;
pub mod source;


pub use error::*;
pub use models::*;
