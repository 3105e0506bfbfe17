//! Native record types and their field bindings.

use crate::types::EntityId;
use chainlog_codec::{CodecResult, FieldKind, FieldValue, NativeField, Timestamp};
use std::any::Any;
use std::fmt;

/// Identity and timestamps of a materialized record.
///
/// All three values derive from transaction timestamps, never from the
/// clock at apply time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordMeta {
    /// Entity id, equal to the ticks of the instantiating timestamp.
    pub id: EntityId,
    /// Timestamp of the instantiate transaction.
    pub created: Timestamp,
    /// Timestamp of the latest transaction that touched the record.
    pub edited: Timestamp,
}

/// A native record type that can be materialized from a chain.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Default)]
/// struct Widget {
///     meta: RecordMeta,
///     name: String,
///     weight: Option<u32>,
/// }
///
/// impl EntityShape for Widget {
///     fn bindings() -> Vec<FieldBinding<Self>> {
///         vec![
///             FieldBinding::new("Name", |w: &Widget| &w.name, |w, v| w.name = v),
///             FieldBinding::new("Weight", |w: &Widget| &w.weight, |w, v| w.weight = v),
///         ]
///     }
///
///     fn meta(&self) -> &RecordMeta { &self.meta }
///     fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
/// }
/// ```
pub trait EntityShape: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Returns the bindings of every native field, matched to field
    /// descriptors by name.
    fn bindings() -> Vec<FieldBinding<Self>>;

    /// Returns the record's identity and timestamps.
    fn meta(&self) -> &RecordMeta;

    /// Returns the record's identity and timestamps for update.
    fn meta_mut(&mut self) -> &mut RecordMeta;
}

type Getter<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, FieldValue) -> CodecResult<()> + Send + Sync>;

/// Binds one native field of `T` to a named field descriptor.
pub struct FieldBinding<T> {
    name: &'static str,
    kind: FieldKind,
    nullable: bool,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> FieldBinding<T> {
    /// Creates a binding from accessor functions.
    ///
    /// The field kind and nullability come from the native type `V`.
    pub fn new<V: NativeField + 'static>(
        name: &'static str,
        get: fn(&T) -> &V,
        set: fn(&mut T, V),
    ) -> Self {
        Self {
            name,
            kind: V::KIND,
            nullable: V::NULLABLE,
            get: Box::new(move |record| get(record).to_field_value()),
            set: Box::new(move |record, value| {
                set(record, V::from_field_value(value)?);
                Ok(())
            }),
        }
    }
}

impl<T> FieldBinding<T> {
    /// Returns the descriptor name this binding matches.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the native field kind.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns true if the native field is an `Option`.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Reads the field from a record.
    pub fn read(&self, record: &T) -> FieldValue {
        (self.get)(record)
    }

    /// Writes a decoded value into a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not convert to the native type.
    pub fn write(&self, record: &mut T, value: FieldValue) -> CodecResult<()> {
        (self.set)(record, value)
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// Type-erased view of a materialized record, as handed to hooks.
pub trait DynRecord: fmt::Debug + Send + Sync {
    /// Returns the record's identity and timestamps.
    fn record_meta(&self) -> &RecordMeta;

    /// Returns the record for downcasting to its native type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: EntityShape> DynRecord for T {
    fn record_meta(&self) -> &RecordMeta {
        self.meta()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
