//! Entity contracts and schema metadata
//!
//! Repositories are generic over types implementing [`Entity`]. The static
//! field table exposed through [`Schema`] is what lets the generic layer
//! validate property paths, compose navigation loads, strip relation fields
//! from writes, and bootstrap declared indexes — without reflection and
//! without committing to a backend.
//!
//! Serde field names double as the storage column/field names, so the same
//! entity type round-trips through the PostgreSQL `jsonb` path and the
//! SurrealDB document path unchanged.

use std::fmt::Display;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

/// Identity type for a persisted entity
///
/// Blanket-implemented for anything comparable, printable, and
/// serializable. `Display` is the canonical storage form of the key.
pub trait EntityKey:
    Display + Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> EntityKey for T where
    T: Display + Clone + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// Cardinality of a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Reference to a single related entity
    One,
    /// Reference to a collection of related entities
    Many,
}

/// A navigation from one entity type to another
///
/// For [`RelationKind::One`] the foreign key is a column on the owning
/// entity; for [`RelationKind::Many`] it is a column on the target.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    /// Storage name of the target entity
    pub target: &'static str,
    /// One or many
    pub kind: RelationKind,
    /// Foreign key column (local for `One`, remote for `Many`)
    pub foreign_key: &'static str,
    /// The target's field table, for walking nested paths
    pub fields: fn() -> &'static [FieldDef],
}

/// One entry in an entity's static field table
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Field name as serialized (also the storage column/field name)
    pub name: &'static str,
    /// Whether a secondary index is declared for this field
    pub indexed: bool,
    /// Whether the declared index is unique
    pub unique: bool,
    /// Present when this field is a navigation rather than a scalar
    pub relation: Option<RelationDef>,
}

impl FieldDef {
    /// A plain scalar column
    pub const fn column(name: &'static str) -> Self {
        Self {
            name,
            indexed: false,
            unique: false,
            relation: None,
        }
    }

    /// A scalar column with a declared ascending index
    pub const fn indexed(name: &'static str) -> Self {
        Self {
            name,
            indexed: true,
            unique: false,
            relation: None,
        }
    }

    /// A scalar column with a declared unique index
    pub const fn unique(name: &'static str) -> Self {
        Self {
            name,
            indexed: true,
            unique: true,
            relation: None,
        }
    }

    /// A to-one navigation; `foreign_key` is the local column holding the
    /// target's identity
    pub const fn has_one(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
        fields: fn() -> &'static [FieldDef],
    ) -> Self {
        Self {
            name,
            indexed: false,
            unique: false,
            relation: Some(RelationDef {
                target,
                kind: RelationKind::One,
                foreign_key,
                fields,
            }),
        }
    }

    /// A to-many navigation; `foreign_key` is the column on the target
    /// pointing back at this entity
    pub const fn has_many(
        name: &'static str,
        target: &'static str,
        foreign_key: &'static str,
        fields: fn() -> &'static [FieldDef],
    ) -> Self {
        Self {
            name,
            indexed: false,
            unique: false,
            relation: Some(RelationDef {
                target,
                kind: RelationKind::Many,
                foreign_key,
                fields,
            }),
        }
    }
}

/// Static storage metadata for a persisted type
pub trait Schema {
    /// Table (PostgreSQL) / collection (SurrealDB) name
    const TABLE: &'static str;

    /// Storage name of the identity field
    const KEY: &'static str = "id";

    /// The static field table
    fn fields() -> &'static [FieldDef];

    /// Column holding the soft-delete marker, when the entity is
    /// soft-deleted rather than removed. Reads filter on this column being
    /// null unless the builder bypasses default filters.
    fn soft_delete_field() -> Option<&'static str> {
        None
    }

    /// Look up a field definition by name
    fn field(name: &str) -> Option<&'static FieldDef> {
        Self::fields().iter().find(|f| f.name == name)
    }
}

/// A persisted domain object with exactly one identity field
pub trait Entity:
    Schema + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    /// The identity type
    type Key: EntityKey;

    /// The entity's identity value
    fn key(&self) -> Self::Key;
}

/// A validated scalar field handle, the typed alternative to ordering by a
/// string property path
///
/// # Panics
///
/// Construction panics when the field does not exist on `E` or names a
/// navigation — misusing a typed handle is a programming error, not a
/// runtime condition.
#[derive(Debug, Clone, Copy)]
pub struct Field<E: Schema> {
    pub(crate) name: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Schema> Field<E> {
    /// Resolve a scalar field handle, panicking on misuse
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        match Self::try_new(name) {
            Ok(field) => field,
            Err(message) => panic!("{message}"),
        }
    }

    /// Fallible variant of [`Field::new`]
    pub fn try_new(name: &'static str) -> Result<Self, String> {
        match E::field(name) {
            Some(def) if def.relation.is_none() => Ok(Self {
                name,
                _entity: PhantomData,
            }),
            Some(_) => Err(format!(
                "`{name}` on `{}` is a navigation, not a scalar field",
                E::TABLE
            )),
            None => Err(format!("`{}` has no field named `{name}`", E::TABLE)),
        }
    }

    /// The field's storage name
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// A validated navigation handle from `E` to `R`
///
/// Returned builders use the type parameters to make `then_include` only
/// reachable after an `include` on the same chain.
///
/// # Panics
///
/// Construction panics when the field does not exist, is not a navigation,
/// or does not target `R`.
#[derive(Debug, Clone, Copy)]
pub struct Relation<E: Schema, R: Schema> {
    pub(crate) def: &'static FieldDef,
    _chain: PhantomData<fn(E) -> R>,
}

impl<E: Schema, R: Schema> Relation<E, R> {
    /// Resolve a navigation handle, panicking on misuse
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        match Self::try_new(name) {
            Ok(relation) => relation,
            Err(message) => panic!("{message}"),
        }
    }

    /// Fallible variant of [`Relation::new`]
    pub fn try_new(name: &'static str) -> Result<Self, String> {
        let def = E::field(name)
            .ok_or_else(|| format!("`{}` has no field named `{name}`", E::TABLE))?;
        let relation = def
            .relation
            .as_ref()
            .ok_or_else(|| format!("`{name}` on `{}` is not a navigation", E::TABLE))?;
        if relation.target != R::TABLE {
            return Err(format!(
                "navigation `{name}` on `{}` targets `{}`, not `{}`",
                E::TABLE,
                relation.target,
                R::TABLE
            ));
        }
        Ok(Self {
            def,
            _chain: PhantomData,
        })
    }

    /// The navigation's field name
    pub const fn name(&self) -> &'static str {
        self.def.name
    }
}

#[cfg(test)]
pub(crate) mod test_schema {
    //! Shared Todo/Category fixture used by unit tests across the crate.

    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Owner {
        pub id: String,
        pub name: String,
    }

    impl Schema for Owner {
        const TABLE: &'static str = "owners";

        fn fields() -> &'static [FieldDef] {
            static FIELDS: &[FieldDef] =
                &[FieldDef::column("id"), FieldDef::indexed("name")];
            FIELDS
        }
    }

    impl Entity for Owner {
        type Key = String;

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Category {
        pub id: String,
        pub name: String,
        pub owner_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub owner: Option<Owner>,
    }

    impl Schema for Category {
        const TABLE: &'static str = "categories";

        fn fields() -> &'static [FieldDef] {
            static FIELDS: &[FieldDef] = &[
                FieldDef::column("id"),
                FieldDef::unique("name"),
                FieldDef::column("owner_id"),
                FieldDef::has_one("owner", "owners", "owner_id", Owner::fields),
            ];
            FIELDS
        }
    }

    impl Entity for Category {
        type Key = String;

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Todo {
        pub id: String,
        pub title: String,
        pub is_completed: bool,
        pub category_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<Category>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    }

    impl Schema for Todo {
        const TABLE: &'static str = "todos";

        fn fields() -> &'static [FieldDef] {
            static FIELDS: &[FieldDef] = &[
                FieldDef::column("id"),
                FieldDef::indexed("title"),
                FieldDef::column("is_completed"),
                FieldDef::column("category_id"),
                FieldDef::has_one("category", "categories", "category_id", Category::fields),
                FieldDef::column("deleted_at"),
            ];
            FIELDS
        }

        fn soft_delete_field() -> Option<&'static str> {
            Some("deleted_at")
        }
    }

    impl Entity for Todo {
        type Key = String;

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    pub fn todo(id: &str, title: &str, completed: bool, category_id: Option<&str>) -> Todo {
        Todo {
            id: id.to_string(),
            title: title.to_string(),
            is_completed: completed,
            category_id: category_id.map(str::to_string),
            category: None,
            deleted_at: None,
        }
    }
}
