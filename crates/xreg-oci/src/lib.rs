mod adapter;
pub mod config;
pub mod mapping;

pub use adapter::{build, OciAdapter};
pub use config::OciConfig;
