//! vault-reader library: the pieces of the CLI that tests exercise directly.

pub mod config;
pub mod directory_remote;

pub use config::{Config, ConfigError};
pub use directory_remote::DirectoryRemote;
