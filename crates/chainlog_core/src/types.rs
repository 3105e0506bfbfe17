//! Core identifier types for chainlog.

use chainlog_codec::Timestamp;
use std::fmt;

/// Identifier of a definition: a control record type or an entity type.
///
/// Ids `0..=8` are reserved for control records; user entity types use
/// larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefinitionId(pub u64);

impl DefinitionId {
    /// Schema root record.
    pub const SCHEMA: Self = Self(0);
    /// Generic transaction marker.
    pub const TRANSACTION: Self = Self(1);
    /// Field descriptor declaration.
    pub const FIELD_DEFINITION: Self = Self(2);
    /// Entity type declaration.
    pub const ENTITY_TYPE: Self = Self(3);
    /// Project metadata.
    pub const PROJECT_META: Self = Self(4);
    /// Block terminator.
    pub const BLOCK_BOUNDARY: Self = Self(5);
    /// Partial update of an existing entity.
    pub const SET_FIELDS: Self = Self(6);
    /// Logical removal of an existing entity.
    pub const ARCHIVE: Self = Self(7);
    /// Highest reserved id.
    pub const MAX_RESERVED: Self = Self(8);

    /// Creates a new definition ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for ids reserved for control records.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 <= Self::MAX_RESERVED.0
    }

    /// Returns true for the ids that resolve without a registry entry.
    #[must_use]
    pub const fn is_bootstrap(self) -> bool {
        self.0 <= Self::ENTITY_TYPE.0
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def:{}", self.0)
    }
}

/// Identifier of a field descriptor.
///
/// Ids `0..=15` are reserved for built-in fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub u64);

impl FieldId {
    /// Transaction timestamp.
    pub const TIMESTAMP: Self = Self(1);
    /// Target entity id.
    pub const ENTITY: Self = Self(2);
    /// Target definition id.
    pub const DEFINITION: Self = Self(3);
    /// Variant-type selector.
    pub const VARIANT: Self = Self(4);
    /// Name carried by schema records.
    pub const NAME: Self = Self(5);
    /// Field id carried by field-definition records.
    pub const FIELD: Self = Self(6);
    /// Field kind code carried by field-definition records.
    pub const KIND: Self = Self(7);
    /// Nullability flag of a field-definition record.
    pub const NULLABLE: Self = Self(8);
    /// Instanceable flag of a field-definition record.
    pub const INSTANCEABLE: Self = Self(9);
    /// First id available to user fields.
    pub const FIRST_USER: Self = Self(16);

    /// Creates a new field ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for ids reserved for built-in fields.
    #[must_use]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field:{}", self.0)
    }
}

/// Identifier of a materialized entity.
///
/// Equal to the tick value of the instantiating transaction's timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Derives the entity id from an instantiating timestamp.
    ///
    /// Returns `None` for timestamps before the epoch.
    #[must_use]
    pub fn from_timestamp(ts: Timestamp) -> Option<Self> {
        u64::try_from(ts.ticks()).ok().map(Self)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Sequence number of a block. The first block of a chain is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Creates a new block ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next block ID.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block:{}", self.0)
    }
}
