//! Type cache registry.
//!
//! Materialized records live in one [`CacheSet`] per entity definition. The
//! [`TypeMap`] says which native type backs which definition name; the
//! [`CacheRegistry`] creates sets lazily as definitions are referenced.
//!
//! ## Field mapping
//!
//! Native fields are declared by [`EntityShape::bindings`] and matched to
//! wire fields by descriptor name. Each set keeps a [`FieldPlan`] that
//! resolves, once per descriptor, the binding and the wire codec of every
//! field id it sees. Ids that match no binding are ignored, so fields can be
//! added to or dropped from a live type without breaking older chains.

mod binding;
mod hooks;
mod plan;
mod registry;
mod set;

pub use binding::{DynRecord, EntityShape, FieldBinding, RecordMeta};
pub use hooks::{CacheHooks, NoopHooks};
pub use plan::FieldPlan;
pub use registry::{CacheRegistry, TypeMap};
pub use set::CacheSet;
