// SQLite module - connection configuration and the connection source built from it.

pub mod config;

pub use config::{SqliteOptions, SqliteOptionsBuilder, SqliteSource};
