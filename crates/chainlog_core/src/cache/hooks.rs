//! Cache hooks: observers of materialization effects.

use super::binding::DynRecord;
use crate::schema::Definition;

/// Receives every successful cache mutation, in apply order.
///
/// All methods default to no-ops.
pub trait CacheHooks: Send {
    /// A record was instantiated.
    fn on_cache_add(&mut self, _definition: &Definition, _record: &dyn DynRecord) {}

    /// A live record was replaced by an updated snapshot.
    fn on_cache_update(&mut self, _definition: &Definition, _record: &dyn DynRecord) {}

    /// A record was archived.
    fn on_cache_remove(&mut self, _definition: &Definition, _record: &dyn DynRecord) {}
}

/// Hooks that observe nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl CacheHooks for NoopHooks {}
