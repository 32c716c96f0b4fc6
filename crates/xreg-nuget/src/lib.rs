//! .NET/NuGet ecosystem adapter: `dotnetregistries/nuget.org/packages`
//! (spec §4.4 NuGet row, §4.5).

mod adapter;
pub mod mapping;

pub use adapter::{build, NuGetAdapter};
