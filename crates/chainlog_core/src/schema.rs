//! Schema registry: definitions and field descriptors.
//!
//! The scanner and applier consume the registry through [`SchemaRegistry`].
//! Two kinds of metadata resolve even when a registry has never been told
//! about them:
//!
//! - the bootstrap definitions `0..=3` (schema, transaction, field
//!   definition, entity type), so a log can carry its own schema;
//! - the built-in fields `$timestamp`, `$entity`, `$definition`, ...
//!
//! [`InMemorySchemaRegistry`] is the provided implementation. It is
//! internally locked so that schema records applied from the log become
//! visible to the scanner for the very next transaction.

use crate::types::{DefinitionId, FieldId};
use chainlog_codec::{FieldCodec, FieldKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The reserved control record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Schema root record.
    Schema,
    /// Generic transaction marker.
    Transaction,
    /// Field descriptor declaration.
    FieldDefinition,
    /// Entity type declaration.
    EntityType,
    /// Project metadata.
    ProjectMeta,
    /// Block terminator.
    BlockBoundary,
    /// Partial update of an existing entity.
    SetFields,
    /// Logical removal of an existing entity.
    Archive,
    /// Reserved for future control use.
    Reserved,
}

impl ControlKind {
    /// All control kinds in id order.
    pub const ALL: [Self; 9] = [
        Self::Schema,
        Self::Transaction,
        Self::FieldDefinition,
        Self::EntityType,
        Self::ProjectMeta,
        Self::BlockBoundary,
        Self::SetFields,
        Self::Archive,
        Self::Reserved,
    ];

    /// Returns the control kind of a reserved id.
    #[must_use]
    pub fn from_id(id: DefinitionId) -> Option<Self> {
        usize::try_from(id.as_u64())
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Returns the reserved definition id.
    #[must_use]
    pub const fn id(self) -> DefinitionId {
        DefinitionId::new(self as u64)
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Schema => "Schema",
            Self::Transaction => "Transaction",
            Self::FieldDefinition => "FieldDefinition",
            Self::EntityType => "EntityType",
            Self::ProjectMeta => "ProjectMeta",
            Self::BlockBoundary => "BlockBoundary",
            Self::SetFields => "SetFields",
            Self::Archive => "Archive",
            Self::Reserved => "Reserved",
        }
    }

    /// Returns true for the records that describe the schema itself.
    #[must_use]
    pub const fn is_schema_record(self) -> bool {
        matches!(
            self,
            Self::Schema
                | Self::Transaction
                | Self::FieldDefinition
                | Self::EntityType
                | Self::ProjectMeta
        )
    }

    fn fields(self) -> Vec<FieldId> {
        match self {
            Self::FieldDefinition => vec![
                FieldId::TIMESTAMP,
                FieldId::FIELD,
                FieldId::NAME,
                FieldId::KIND,
                FieldId::NULLABLE,
                FieldId::INSTANCEABLE,
            ],
            Self::EntityType => vec![
                FieldId::TIMESTAMP,
                FieldId::DEFINITION,
                FieldId::NAME,
                FieldId::FIELD,
            ],
            Self::SetFields | Self::Archive => {
                vec![FieldId::ENTITY, FieldId::DEFINITION, FieldId::TIMESTAMP]
            }
            Self::Schema | Self::ProjectMeta => vec![FieldId::TIMESTAMP, FieldId::NAME],
            Self::Transaction | Self::BlockBoundary => vec![FieldId::TIMESTAMP],
            Self::Reserved => Vec::new(),
        }
    }
}

/// Whether a definition is a control record or a user entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// Reserved control record.
    Control(ControlKind),
    /// User entity type, instantiated by transactions of this definition.
    Entity,
}

/// A resolved definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Definition id.
    pub id: DefinitionId,
    /// Type name; entity types are matched to native types by this name.
    pub name: String,
    /// Control or entity.
    pub kind: DefinitionKind,
    /// Fields that belong to the type, in declaration order.
    pub fields: Vec<FieldId>,
}

impl Definition {
    /// Creates the definition of a control record.
    #[must_use]
    pub fn control(kind: ControlKind) -> Self {
        Self {
            id: kind.id(),
            name: kind.name().to_owned(),
            kind: DefinitionKind::Control(kind),
            fields: kind.fields(),
        }
    }

    /// Creates an entity type definition.
    #[must_use]
    pub fn entity(id: DefinitionId, name: impl Into<String>, fields: Vec<FieldId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: DefinitionKind::Entity,
            fields,
        }
    }

    /// Returns the control kind, if this is a control record.
    #[must_use]
    pub fn control_kind(&self) -> Option<ControlKind> {
        match self.kind {
            DefinitionKind::Control(kind) => Some(kind),
            DefinitionKind::Entity => None,
        }
    }

    /// Returns true for user entity types.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.kind == DefinitionKind::Entity
    }

    /// Returns true for the block terminator.
    #[must_use]
    pub fn is_block_boundary(&self) -> bool {
        self.kind == DefinitionKind::Control(ControlKind::BlockBoundary)
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Metadata of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field id.
    pub id: FieldId,
    /// Field name; bound to native fields by this name.
    pub name: String,
    /// Wire kind.
    pub kind: FieldKind,
    /// Whether the field accepts null.
    pub nullable: bool,
    /// Whether the field may be set by an instantiate transaction.
    pub instanceable: bool,
}

impl FieldDescriptor {
    /// Creates a non-nullable, instanceable descriptor.
    #[must_use]
    pub fn new(id: FieldId, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            nullable: false,
            instanceable: true,
        }
    }

    /// Sets nullability.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets whether the field is legal on instantiate.
    #[must_use]
    pub fn instanceable(mut self, instanceable: bool) -> Self {
        self.instanceable = instanceable;
        self
    }

    /// Returns the wire codec for this descriptor.
    #[must_use]
    pub fn codec(&self) -> FieldCodec {
        FieldCodec::resolve(self.kind, self.nullable)
    }

    /// Returns true if values travel as inline varints.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind.is_inline()
    }
}

/// Returns the descriptor of a built-in field.
#[must_use]
pub fn builtin_field(id: FieldId) -> Option<FieldDescriptor> {
    let (name, kind, instanceable) = match id {
        FieldId::TIMESTAMP => ("$timestamp", FieldKind::Timestamp, true),
        FieldId::ENTITY => ("$entity", FieldKind::U64, false),
        FieldId::DEFINITION => ("$definition", FieldKind::U64, false),
        FieldId::VARIANT => ("$variant", FieldKind::U64, true),
        FieldId::NAME => ("$name", FieldKind::String, false),
        FieldId::FIELD => ("$field", FieldKind::U64, false),
        FieldId::KIND => ("$kind", FieldKind::U8, false),
        FieldId::NULLABLE => ("$nullable", FieldKind::Bool, false),
        FieldId::INSTANCEABLE => ("$instanceable", FieldKind::Bool, false),
        _ => return None,
    };
    Some(FieldDescriptor::new(id, name, kind).instanceable(instanceable))
}

/// Returns the hardwired definition of a bootstrap id.
#[must_use]
pub fn bootstrap_definition(id: DefinitionId) -> Option<Definition> {
    if id.is_bootstrap() {
        ControlKind::from_id(id).map(Definition::control)
    } else {
        None
    }
}

/// Source of definitions and field descriptors.
pub trait SchemaRegistry: Send + Sync {
    /// Looks up a definition known to this registry.
    fn lookup_definition(&self, id: DefinitionId) -> Option<Arc<Definition>>;

    /// Looks up a field descriptor known to this registry.
    fn lookup_field(&self, id: FieldId) -> Option<Arc<FieldDescriptor>>;

    /// Resolves a definition, falling back to the bootstrap ids.
    fn resolve_definition(&self, id: DefinitionId) -> Option<Arc<Definition>> {
        self.lookup_definition(id)
            .or_else(|| bootstrap_definition(id).map(Arc::new))
    }

    /// Resolves a field descriptor, falling back to the built-in fields.
    fn resolve_field(&self, id: FieldId) -> Option<Arc<FieldDescriptor>> {
        self.lookup_field(id)
            .or_else(|| builtin_field(id).map(Arc::new))
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    definitions: HashMap<DefinitionId, Arc<Definition>>,
    fields: HashMap<FieldId, Arc<FieldDescriptor>>,
}

/// Thread-safe in-memory schema registry.
#[derive(Debug, Default)]
pub struct InMemorySchemaRegistry {
    inner: RwLock<RegistryInner>,
}

impl InMemorySchemaRegistry {
    /// Creates an empty registry. Only bootstrap ids and built-in fields
    /// resolve.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with every control definition and
    /// built-in field.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.inner.write();
            for kind in ControlKind::ALL {
                inner
                    .definitions
                    .insert(kind.id(), Arc::new(Definition::control(kind)));
            }
            for id in 0..FieldId::FIRST_USER.as_u64() {
                if let Some(descriptor) = builtin_field(FieldId::new(id)) {
                    inner.fields.insert(descriptor.id, Arc::new(descriptor));
                }
            }
        }
        registry
    }

    /// Registers or replaces a definition.
    pub fn register_definition(&self, definition: Definition) -> Arc<Definition> {
        let definition = Arc::new(definition);
        self.inner
            .write()
            .definitions
            .insert(definition.id, Arc::clone(&definition));
        definition
    }

    /// Registers or replaces a field descriptor.
    pub fn register_field(&self, descriptor: FieldDescriptor) -> Arc<FieldDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.inner
            .write()
            .fields
            .insert(descriptor.id, Arc::clone(&descriptor));
        descriptor
    }

    /// Removes a field descriptor. Later transactions carrying the id are
    /// skipped as unknown.
    pub fn remove_field(&self, id: FieldId) -> Option<Arc<FieldDescriptor>> {
        self.inner.write().fields.remove(&id)
    }

    /// Returns the entity definition with the given name.
    #[must_use]
    pub fn definition_by_name(&self, name: &str) -> Option<Arc<Definition>> {
        self.inner
            .read()
            .definitions
            .values()
            .find(|d| d.is_entity() && d.name == name)
            .cloned()
    }

    /// Returns the number of registered definitions.
    #[must_use]
    pub fn definition_count(&self) -> usize {
        self.inner.read().definitions.len()
    }
}

impl SchemaRegistry for InMemorySchemaRegistry {
    fn lookup_definition(&self, id: DefinitionId) -> Option<Arc<Definition>> {
        self.inner.read().definitions.get(&id).cloned()
    }

    fn lookup_field(&self, id: FieldId) -> Option<Arc<FieldDescriptor>> {
        self.inner.read().fields.get(&id).cloned()
    }
}
