pub mod config;
pub mod error;
pub mod video;

pub use config::Config;
pub use error::*;
pub use video::*;
