//! Field identity tokens.
//!
//! A [`FieldId`] names one field of one table of one open database handle.
//! Handles draw their [`HandleId`] from a process-wide counter that never
//! repeats, so a token outliving its handle can never alias a field of a
//! handle opened later.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an opened database handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Issues a fresh, never reused identifier.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A table slot of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableToken {
    /// Owning handle.
    pub handle: HandleId,
    /// Declaration index of the entity in its schema.
    pub table: u32,
}

impl TableToken {
    /// Token of field `index` of this table.
    #[must_use]
    pub const fn field(self, index: u32) -> FieldId {
        FieldId {
            handle: self.handle,
            table: self.table,
            field: index,
        }
    }
}

/// Stable identity of one field. Key of the field registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    /// Owning handle.
    pub handle: HandleId,
    /// Table slot.
    pub table: u32,
    /// Field index in the entity shape.
    pub field: u32,
}

impl FieldId {
    /// Table slot this field belongs to.
    #[must_use]
    pub const fn table_token(self) -> TableToken {
        TableToken {
            handle: self.handle,
            table: self.table,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.handle, self.table, self.field)
    }
}

/// A typed column token, e.g. `db.animal.name: Col<String>`.
///
/// The type parameter only drives argument checking; resolution goes
/// through the [`FieldId`].
pub struct Col<T> {
    id: FieldId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Col<T> {
    /// Wraps a field token.
    #[must_use]
    pub const fn new(id: FieldId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The field token.
    #[must_use]
    pub const fn id(self) -> FieldId {
        self.id
    }
}

impl<T> Clone for Col<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Col<T> {}

impl<T> fmt::Debug for Col<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Col").field(&self.id).finish()
    }
}

impl<T> PartialEq for Col<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Col<T> {}

impl<T> From<Col<T>> for FieldId {
    fn from(col: Col<T>) -> Self {
        col.id
    }
}
