//! Table handles exposed on a database root.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Mutex, PoisonError};

use crate::field::{HandleId, TableToken};
use crate::shape::{Entity, SchemaDecl, SchemaMember};
use crate::value::SqlValue;

/// Hands out table slots in declaration order while a schema is bound.
#[derive(Debug)]
pub struct TableBinder {
    handle: HandleId,
    next: u32,
}

impl TableBinder {
    /// Starts binding for `handle` at slot zero.
    #[must_use]
    pub const fn new(handle: HandleId) -> Self {
        Self { handle, next: 0 }
    }

    /// Reserves the next slot.
    pub fn next_table(&mut self) -> TableToken {
        let token = TableToken {
            handle: self.handle,
            table: self.next,
        };
        self.next += 1;
        token
    }

    /// Number of slots handed out so far.
    #[must_use]
    pub const fn bound(&self) -> u32 {
        self.next
    }
}

/// The primary-key values of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTuple(pub Vec<SqlValue>);

impl Eq for KeyTuple {}

impl Hash for KeyTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                SqlValue::Null => {}
                SqlValue::Bool(b) => b.hash(state),
                SqlValue::Int(n) => n.hash(state),
                SqlValue::Float(f) => f.to_bits().hash(state),
                SqlValue::Text(s) => s.hash(state),
                SqlValue::Blob(b) => b.hash(state),
            }
        }
    }
}

/// Per-table bookkeeping of rows known to exist or pending deletion.
///
/// Statement builders do not consult the tracker.
#[derive(Debug, Default)]
pub struct RowTracker {
    existing: Mutex<HashSet<KeyTuple>>,
    deleted: Mutex<HashSet<KeyTuple>>,
}

impl RowTracker {
    /// Records a row as existing and clears any pending deletion.
    pub fn mark_existing(&self, key: KeyTuple) {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.existing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    /// Moves a row from existing to pending deletion.
    pub fn mark_deleted(&self, key: KeyTuple) {
        self.existing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    /// Whether the row is recorded as existing.
    #[must_use]
    pub fn is_existing(&self, key: &KeyTuple) -> bool {
        self.existing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Whether the row is pending deletion.
    #[must_use]
    pub fn is_deleted(&self, key: &KeyTuple) -> bool {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Forgets every row.
    pub fn clear(&self) {
        self.existing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A table of a database handle, dereferencing to the entity's column
/// tokens: `db.animal.name`.
pub struct Table<E: Entity> {
    table_token: TableToken,
    column_set: E::Columns,
    row_tracker: RowTracker,
}

impl<E: Entity> Table<E> {
    /// Binds a table to a slot.
    #[must_use]
    pub fn new(token: TableToken) -> Self {
        Self {
            table_token: token,
            column_set: E::columns(token),
            row_tracker: RowTracker::default(),
        }
    }

    /// Slot of this table.
    #[must_use]
    pub const fn token(&self) -> TableToken {
        self.table_token
    }

    /// Column tokens.
    #[must_use]
    pub const fn columns(&self) -> &E::Columns {
        &self.column_set
    }

    /// Row tracker of this table.
    #[must_use]
    pub const fn tracker(&self) -> &RowTracker {
        &self.row_tracker
    }
}

impl<E: Entity> Deref for Table<E> {
    type Target = E::Columns;

    fn deref(&self) -> &Self::Target {
        &self.column_set
    }
}

impl<E: Entity> fmt::Debug for Table<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("entity", &E::shape().type_name)
            .field("token", &self.table_token)
            .finish_non_exhaustive()
    }
}

impl<E: Entity> SchemaMember for Table<E> {
    fn declare(decl: &mut SchemaDecl, namespace: Option<&'static str>) {
        decl.push_entity(E::shape(), namespace);
    }

    fn bind(binder: &mut TableBinder) -> Self {
        Self::new(binder.next_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binder_slots_are_sequential() {
        let handle = HandleId::next();
        let mut binder = TableBinder::new(handle);
        assert_eq!(binder.next_table().table, 0);
        assert_eq!(binder.next_table().table, 1);
        assert_eq!(binder.bound(), 2);
    }

    #[test]
    fn test_tracker_moves_keys() {
        let tracker = RowTracker::default();
        let key = KeyTuple(vec![SqlValue::Int(1), SqlValue::Text("a".into())]);
        tracker.mark_existing(key.clone());
        assert!(tracker.is_existing(&key));
        tracker.mark_deleted(key.clone());
        assert!(!tracker.is_existing(&key));
        assert!(tracker.is_deleted(&key));
        tracker.clear();
        assert!(!tracker.is_deleted(&key));
    }
}
