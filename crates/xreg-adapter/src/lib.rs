//! Generic per-ecosystem adapter HTTP surface (spec §4.4, §4.5, §4.10):
//! routing, middleware, model/capabilities serving, parameterized over the
//! `EcosystemAdapter` trait every ecosystem crate implements. Every
//! ecosystem binary is a thin wiring layer that hands its adapter instance
//! to `xreg_adapter::serve`.

pub mod config;
pub mod error;
pub mod inline_expand;
pub mod middleware;
pub mod name_phase;
pub mod routes;
pub mod serve;
mod trait_;

pub use config::AdapterConfig;
pub use error::{AdapterError, AdapterErrorResponse};
pub use routes::AdapterState;
pub use serve::{router, serve};
pub use trait_::EcosystemAdapter;
