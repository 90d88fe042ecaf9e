//! Property-path resolution
//!
//! Turns a dot-separated string such as `"category.owner.name"` into a
//! validated chain of field accessors against an entity's static field
//! table, walked left to right from the root type. Resolution happens at
//! call time; every segment must exist on the type reached so far, and only
//! to-one navigations may appear before the terminal segment. There is no
//! silent fallback: an unresolvable segment fails with an invalid-argument
//! error naming the missing member.

use crate::entity::{FieldDef, RelationKind, Schema};
use crate::repository::{RepositoryError, RepositoryResult};

/// One resolved segment of a property path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    /// Field name of the segment
    pub name: &'static str,
    /// Set when the segment is a navigation
    pub relation: Option<ResolvedRelation>,
}

/// Relation metadata carried by a navigation segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRelation {
    /// Target table/collection
    pub target: &'static str,
    /// One or many
    pub kind: RelationKind,
    /// Foreign key (local for one, remote for many)
    pub foreign_key: &'static str,
}

/// A validated property path ending in a scalar field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Resolve a dot-separated path against `E`'s field table
    pub fn resolve<E: Schema>(path: &str) -> RepositoryResult<Self> {
        let segments = walk::<E>(path, SegmentRule::ScalarTerminal)?;
        Ok(Self { segments })
    }

    /// The resolved segments, root first
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The dotted form of the resolved path
    pub fn dotted(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.name)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether the path stays on the root entity
    pub fn is_local(&self) -> bool {
        self.segments.len() == 1
    }
}

/// Resolve a dot-separated path where every segment must be a navigation
/// (used by the include-by-string escape hatch)
pub(crate) fn resolve_relations<E: Schema>(path: &str) -> RepositoryResult<Vec<PathSegment>> {
    walk::<E>(path, SegmentRule::RelationsOnly)
}

#[derive(Clone, Copy, PartialEq)]
enum SegmentRule {
    /// Intermediate segments are to-one navigations; the terminal is scalar
    ScalarTerminal,
    /// Every segment is a navigation (one or many)
    RelationsOnly,
}

fn walk<E: Schema>(path: &str, rule: SegmentRule) -> RepositoryResult<Vec<PathSegment>> {
    if path.trim().is_empty() {
        return Err(RepositoryError::invalid_argument(
            "property path must not be empty",
        ));
    }

    let parts: Vec<&str> = path.split('.').collect();
    let mut fields: &'static [FieldDef] = E::fields();
    let mut segments = Vec::with_capacity(parts.len());

    for (position, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part.is_empty() {
            return Err(RepositoryError::invalid_argument(format!(
                "property path `{path}` contains an empty segment"
            )));
        }

        let def = fields.iter().find(|f| f.name == part).ok_or_else(|| {
            RepositoryError::invalid_argument(format!(
                "unknown member `{part}` in property path `{path}`"
            ))
        })?;

        let terminal = position + 1 == parts.len();
        match (&def.relation, rule) {
            (Some(relation), SegmentRule::ScalarTerminal) => {
                if terminal {
                    return Err(RepositoryError::invalid_argument(format!(
                        "property path `{path}` must end in a scalar field, \
                         but `{part}` is a navigation"
                    )));
                }
                if relation.kind == RelationKind::Many {
                    return Err(RepositoryError::invalid_argument(format!(
                        "property path `{path}` crosses the collection navigation `{part}`"
                    )));
                }
                fields = (relation.fields)();
                segments.push(PathSegment {
                    name: def.name,
                    relation: Some(ResolvedRelation {
                        target: relation.target,
                        kind: relation.kind,
                        foreign_key: relation.foreign_key,
                    }),
                });
            }
            (Some(relation), SegmentRule::RelationsOnly) => {
                fields = (relation.fields)();
                segments.push(PathSegment {
                    name: def.name,
                    relation: Some(ResolvedRelation {
                        target: relation.target,
                        kind: relation.kind,
                        foreign_key: relation.foreign_key,
                    }),
                });
            }
            (None, SegmentRule::ScalarTerminal) => {
                if !terminal {
                    return Err(RepositoryError::invalid_argument(format!(
                        "`{part}` in property path `{path}` is not a navigation"
                    )));
                }
                segments.push(PathSegment {
                    name: def.name,
                    relation: None,
                });
            }
            (None, SegmentRule::RelationsOnly) => {
                return Err(RepositoryError::invalid_argument(format!(
                    "`{part}` in include path `{path}` is not a navigation"
                )));
            }
        }
    }

    Ok(segments)
}
