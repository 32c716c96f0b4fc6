//! Maven/Java ecosystem adapter: `javaregistries/maven-central/packages`
//! (spec §4.4 Maven row, §4.5).

mod adapter;
pub mod mapping;

pub use adapter::{build, MavenAdapter};
