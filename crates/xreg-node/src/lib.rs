//! Node/npm ecosystem adapter: `noderegistries/npmjs.org/packages` (spec
//! §4.4 Node row, §4.5).

mod adapter;
pub mod mapping;

pub use adapter::{build, NodeAdapter};
