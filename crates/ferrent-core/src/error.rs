//! Error types raised while reading entity metadata and converting values.

/// A schema or directive problem detected while opening a database handle or
/// synthesizing a migration.
///
/// Configuration errors are reported before any field binding is
/// registered, so a failed open leaves no trace in the field registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No field is flagged `pk` and no field is named `id`.
    #[error("entity '{entity}' has no primary key; flag a field with `pk` or add an `id` field")]
    MissingPrimaryKey {
        /// Entity type name.
        entity: String,
    },

    /// A directive string could not be parsed.
    #[error("invalid directive `{directive}` on {entity}.{field}: {reason}")]
    InvalidDirective {
        /// Entity type name.
        entity: String,
        /// Field identifier.
        field: String,
        /// The offending directive token.
        directive: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two index declarations share a name but disagree on uniqueness or
    /// function.
    #[error("index '{index}' on table '{table}' is declared twice with different options")]
    IndexConflict {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },

    /// The same entity type was declared twice in one schema.
    #[error("entity '{0}' is declared more than once")]
    DuplicateEntity(String),

    /// The entity shape cannot be mapped to a table.
    #[error("entity '{entity}' cannot be mapped: {reason}")]
    InvalidShape {
        /// Entity type name.
        entity: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failure converting between a [`SqlValue`](crate::SqlValue) and a field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// A NULL was read into a non-optional field.
    #[error("unexpected NULL for a field of type {expected}")]
    UnexpectedNull {
        /// Field type.
        expected: &'static str,
    },

    /// The stored value has a different storage class.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Field type.
        expected: &'static str,
        /// Storage class of the value.
        found: &'static str,
    },

    /// An integer does not fit in the field type.
    #[error("value {value} is out of range for {expected}")]
    OutOfRange {
        /// Field type.
        expected: &'static str,
        /// The value that did not fit.
        value: String,
    },

    /// Text could not be parsed into the field type.
    #[error("cannot parse {expected}: {message}")]
    Parse {
        /// Field type.
        expected: &'static str,
        /// Parser message.
        message: String,
    },

    /// The row did not contain a value for a required position.
    #[error("row has no value at position {0}")]
    MissingColumn(usize),

    /// A field index outside the entity's shape was addressed.
    #[error("field index {index} does not exist on '{entity}'")]
    UnknownField {
        /// Entity type name.
        entity: &'static str,
        /// Field index.
        index: usize,
    },
}

/// Result type for configuration steps.
pub type Result<T> = std::result::Result<T, ConfigError>;
