//! Shared xRegistry entity model, RFC 9457 problem-details errors, and the
//! filter/sort/inline/pagination engine used by every adapter and the
//! Bridge.

pub mod attr;
pub mod collection;
pub mod entity;
pub mod filter;
pub mod inline;
pub mod pagination;
pub mod problem;
pub mod sort;
pub mod xid;

pub use attr::{AttrValue, Filterable, Sortable};
pub use collection::{apply_collection, CollectionOptions, CollectionRequest, CollectionResult};
pub use entity::{EntityBase, EntityConfig, EntityKind, Group, Labels, Meta, Registry, Resource, Version, SPEC_VERSION};
pub use inline::{parse_inline, Inline, InlineSpec};
pub use problem::{ProblemDetails, ProblemKind};
pub use xid::{InvalidEntity, Xid};
