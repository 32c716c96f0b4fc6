//! The aggregation bridge (spec §4.9): startup handshake, model/capability
//! merge, a read-only routing table, request forwarding, and health
//! aggregation across every configured ecosystem adapter.

pub mod config;
pub mod error;
pub mod forward;
pub mod handshake;
pub mod health;
pub mod model;
pub mod routes;
pub mod routing;
pub mod serve;
pub mod state;

pub use config::{AdapterDescriptor, BridgeConfig};
pub use error::{BridgeError, BridgeErrorResponse};
pub use routes::BridgeState;
pub use serve::{bootstrap, router, serve};
