//! Relation inference from foreign-key naming.
//!
//! A field `HabitatId` on `Animal` refers to the primary key `Id` of the
//! sibling entity `Habitat`. The inferencer searches increasing prefix cuts
//! of the field identifier for a sibling entity name and then checks that
//! the remaining suffix names one of that sibling's primary keys. The first
//! cut that matches wins, so a sibling whose name is a prefix of another
//! sibling's name shadows it.
//!
//! Both the introspector and the migration synthesizer call into this
//! module, which keeps their view of relations identical.

use std::collections::HashMap;

use crate::directive::Directives;
use crate::error::{ConfigError, Result};
use crate::shape::{EntityShape, SchemaDecl};

/// An entity of a schema with its directives parsed and primary-key
/// candidates resolved.
#[derive(Debug, Clone)]
pub struct ParsedEntity {
    /// Entity shape.
    pub shape: &'static EntityShape,
    /// Schema namespace.
    pub namespace: Option<&'static str>,
    /// Directives of each field, by field index.
    pub directives: Vec<Directives>,
    /// Indexes of the primary-key fields. May be empty; the introspector
    /// rejects such entities.
    pub primary_keys: Vec<usize>,
}

impl ParsedEntity {
    fn parse(shape: &'static EntityShape, namespace: Option<&'static str>) -> Result<Self> {
        let directives = shape
            .fields
            .iter()
            .map(|field| {
                Directives::parse(field.directives).map_err(|e| ConfigError::InvalidDirective {
                    entity: shape.type_name.to_string(),
                    field: field.ident.to_string(),
                    directive: e.directive,
                    reason: e.reason,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let primary_keys = primary_key_fields(shape, &directives);
        Ok(Self {
            shape,
            namespace,
            directives,
            primary_keys,
        })
    }

    /// Whether field `index` is a primary key.
    #[must_use]
    pub fn is_primary_key(&self, index: usize) -> bool {
        self.primary_keys.contains(&index)
    }

    /// Identifiers of the primary-key fields.
    #[must_use]
    pub fn primary_key_idents(&self) -> Vec<&'static str> {
        self.primary_keys
            .iter()
            .map(|&i| self.shape.fields[i].ident)
            .collect()
    }
}

/// Resolves the primary-key fields of an entity: every field flagged `pk`,
/// otherwise the column field named `id` in any case.
#[must_use]
pub fn primary_key_fields(shape: &EntityShape, directives: &[Directives]) -> Vec<usize> {
    let flagged: Vec<usize> = directives
        .iter()
        .enumerate()
        .filter(|(_, d)| d.primary_key)
        .map(|(i, _)| i)
        .collect();
    if !flagged.is_empty() {
        return flagged;
    }
    shape
        .fields
        .iter()
        .position(|f| f.is_column() && f.ident.eq_ignore_ascii_case("id"))
        .into_iter()
        .collect()
}

/// A matched foreign key.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey<'a> {
    /// The referenced sibling.
    pub target: &'a ParsedEntity,
    /// Index of the referenced primary-key field on the target.
    pub target_field: usize,
}

impl ForeignKey<'_> {
    /// Identifier of the referenced primary key.
    #[must_use]
    pub fn target_ident(&self) -> &'static str {
        self.target.shape.fields[self.target_field].ident
    }
}

/// Direction of an inferred relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationClass {
    /// The field's entity is the single side (one-to-one or one-to-many).
    OneToSome,
    /// The field's entity is the owning "many" side, or a join entity of a
    /// many-to-many relation.
    ManyToSome,
}

/// Every entity declared by a schema, addressable by type name.
#[derive(Debug, Clone)]
pub struct Siblings {
    entities: Vec<ParsedEntity>,
    by_name: HashMap<&'static str, usize>,
}

impl Siblings {
    /// Parses the directives of every declared entity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDirective`] for malformed directives and
    /// [`ConfigError::DuplicateEntity`] when a type is declared twice.
    pub fn new(decl: &SchemaDecl) -> Result<Self> {
        let mut entities = Vec::with_capacity(decl.entities.len());
        let mut by_name = HashMap::with_capacity(decl.entities.len());
        for (slot, entity) in decl.entities.iter().enumerate() {
            if by_name.insert(entity.shape.type_name, slot).is_some() {
                return Err(ConfigError::DuplicateEntity(
                    entity.shape.type_name.to_string(),
                ));
            }
            entities.push(ParsedEntity::parse(entity.shape, entity.namespace)?);
        }
        Ok(Self { entities, by_name })
    }

    /// Entities in declaration order.
    #[must_use]
    pub fn entities(&self) -> &[ParsedEntity] {
        &self.entities
    }

    /// Looks up a sibling by type name.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&ParsedEntity> {
        self.by_name.get(type_name).map(|&i| &self.entities[i])
    }

    /// Searches a sibling primary key named by `ident`.
    ///
    /// Prefix cuts are tried from the shortest upward; a cut matches when the
    /// prefix is a sibling with primary keys and the suffix matches one of
    /// them (see [`compare_foreign_key`]).
    #[must_use]
    pub fn foreign_key(&self, ident: &str) -> Option<ForeignKey<'_>> {
        ident
            .char_indices()
            .skip(1)
            .find_map(|(cut, _)| {
                let (prefix, suffix) = ident.split_at(cut);
                let target = self.get(prefix)?;
                if target.primary_keys.is_empty() {
                    return None;
                }
                let pk = compare_foreign_key(suffix, &target.primary_key_idents())?;
                let target_field = target
                    .primary_keys
                    .iter()
                    .copied()
                    .find(|&i| target.shape.fields[i].ident == pk)?;
                Some(ForeignKey {
                    target,
                    target_field,
                })
            })
    }

    /// Decides the direction of a relation held by `owner`.
    ///
    /// The target holding a `Vec` of `owner` makes `owner` the many side.
    /// Otherwise the owner's name with the target name removed may name a
    /// third entity that holds a `Vec` of the target; `owner` is then a join
    /// entity. Anything else is a one-to-some relation.
    #[must_use]
    pub fn classify(&self, owner: &EntityShape, fk: &ForeignKey<'_>) -> RelationClass {
        let target = fk.target.shape;
        if target.has_collection_of(owner.type_name) {
            return RelationClass::ManyToSome;
        }
        let remainder = owner.type_name.replace(target.type_name, "");
        if remainder != owner.type_name {
            if let Some(other) = self.get(&remainder) {
                if other.shape.has_collection_of(target.type_name) {
                    return RelationClass::ManyToSome;
                }
            }
        }
        RelationClass::OneToSome
    }
}

/// Matches the suffix of a field identifier against primary-key names.
///
/// With a single key the suffix must start with its name. With several keys
/// the suffix is cut at increasing lengths and the first cut equal to a key
/// name wins.
#[must_use]
pub fn compare_foreign_key<'a>(suffix: &str, primary_keys: &[&'a str]) -> Option<&'a str> {
    match primary_keys {
        [] => None,
        [only] => suffix.starts_with(only).then_some(*only),
        many => suffix
            .char_indices()
            .map(|(i, c)| &suffix[..i + c.len_utf8()])
            .find_map(|cut| many.iter().copied().find(|pk| *pk == cut)),
    }
}
