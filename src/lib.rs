pub mod codec;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
