pub mod chat;
pub mod config;
pub mod error;
pub mod eval;
pub mod ingest;
pub mod services;
pub mod tokens;

pub use config::Config;
pub use error::{RagchatError, Result};
