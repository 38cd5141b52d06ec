pub mod directory;
pub mod host;
pub mod http;
pub mod types;
