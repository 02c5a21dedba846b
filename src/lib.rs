mod api;
pub mod args;
mod cloud;
pub mod commands;
mod config;
mod error;
mod model;
mod prompt;
mod render;
mod scrape;
mod secrets;
mod tabular;
mod utils;

pub use config::Config;
pub use error::Error;
pub use error::Result;
pub use model::{CreatableMaster, DealType, MasterKind, ReadFormat};
pub use secrets::SecretBackend;
