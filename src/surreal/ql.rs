//! SurrealQL rendering for the SurrealDB adapter
//!
//! Documents store scalar fields plus the record id; the string identity
//! is projected back out with `record::id(id) AS id` so entities keyed by
//! plain strings round-trip unchanged. Navigation loads are correlated
//! subqueries aliased to the navigation field, and nested order paths
//! project auxiliary `__sort_n` fields (serde ignores them on the way
//! back). Filter values are always bound (`$p1`, `$p2`, ...), never
//! spliced.

use serde_json::Value;

use crate::entity::{Entity, RelationKind};
use crate::query::path::PathSegment;
use crate::query::plan::{IncludeStep, OrderKey, QueryPlan};
use crate::query::{FilterCondition, FilterOperator, FilterValue, PropertyPath};
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Rendered SurrealQL text plus its named bind values
#[derive(Debug, Clone)]
pub(crate) struct SurrealQuery {
    pub text: String,
    pub binds: Vec<(String, Value)>,
}

/// Identity restriction for point and batch lookups
#[derive(Debug, Clone)]
pub(crate) enum KeyFilter {
    One(String),
    Many(Vec<String>),
}

/// Per-call knobs on a rendered SELECT
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectParams {
    pub key_filter: Option<KeyFilter>,
    pub limit: Option<i64>,
    pub start: Option<i64>,
    /// Flip every ordering direction (for `last`)
    pub reverse: bool,
}

/// Convert a bindable value to the JSON form handed to the driver
pub(crate) fn bind_json(value: &FilterValue) -> Value {
    match value {
        FilterValue::String(s) => Value::from(s.clone()),
        FilterValue::Integer(n) => Value::from(*n),
        FilterValue::Float(n) => Value::from(*n),
        FilterValue::Boolean(b) => Value::from(*b),
        FilterValue::Uuid(u) => Value::from(u.to_string()),
        FilterValue::DateTime(t) => Value::from(t.to_rfc3339()),
        FilterValue::StringList(list) => Value::from(list.clone()),
        FilterValue::IntegerList(list) => Value::from(list.clone()),
        FilterValue::Json(v) => v.clone(),
        FilterValue::Null => Value::Null,
    }
}

/// Render a plan to a SurrealQL SELECT
pub(crate) fn render_select<E: Entity>(
    plan: &QueryPlan,
    params: &SelectParams,
) -> RepositoryResult<SurrealQuery> {
    plan.check()?;

    let mut binds: Vec<(String, Value)> = Vec::new();
    let mut projections = vec!["*".to_string(), "record::id(id) AS id".to_string()];

    for chain in plan.distinct_includes() {
        projections.push(render_chain(&chain.steps));
    }

    // ordering; nested paths get auxiliary projections
    let mut order_keys = Vec::new();
    for (index, spec) in plan.order.iter().enumerate() {
        let key = match &spec.key {
            OrderKey::Natural => "id".to_string(),
            OrderKey::Path(path) if path.is_local() => path.dotted(),
            OrderKey::Path(path) => {
                let alias = format!("__sort_{index}");
                projections.push(format!("{} AS {alias}", scalar_expr(path.segments())));
                alias
            }
        };
        let direction = if params.reverse {
            spec.direction.reversed()
        } else {
            spec.direction
        };
        order_keys.push(format!("{key} {direction}"));
    }
    if order_keys.is_empty() && params.reverse {
        order_keys.push("id DESC".to_string());
    }

    let mut text = format!("SELECT {} FROM {}", projections.join(", "), E::TABLE);

    let clauses = where_clauses::<E>(plan, params.key_filter.as_ref(), &mut binds)?;
    if !clauses.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&clauses.join(" AND "));
    }

    if !order_keys.is_empty() {
        text.push_str(" ORDER BY ");
        text.push_str(&order_keys.join(", "));
    }
    if let Some(limit) = params.limit {
        text.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(start) = params.start {
        text.push_str(&format!(" START {start}"));
    }

    Ok(SurrealQuery { text, binds })
}

/// Render a count query (`GROUP ALL` collapses to a single row)
pub(crate) fn render_count<E: Entity>(
    filters: &[FilterCondition],
    bypass_default_filters: bool,
) -> RepositoryResult<SurrealQuery> {
    let mut plan = QueryPlan::default();
    plan.filters = filters.to_vec();
    plan.bypass_default_filters = bypass_default_filters;

    let mut binds = Vec::new();
    let mut text = format!("SELECT count() AS count FROM {}", E::TABLE);
    let clauses = where_clauses::<E>(&plan, None, &mut binds)?;
    if !clauses.is_empty() {
        text.push_str(" WHERE ");
        text.push_str(&clauses.join(" AND "));
    }
    text.push_str(" GROUP ALL");

    Ok(SurrealQuery { text, binds })
}

fn where_clauses<E: Entity>(
    plan: &QueryPlan,
    key_filter: Option<&KeyFilter>,
    binds: &mut Vec<(String, Value)>,
) -> RepositoryResult<Vec<String>> {
    let mut clauses = Vec::new();

    match key_filter {
        Some(KeyFilter::One(id)) => {
            let name = push_bind(binds, Value::from(id.clone()));
            clauses.push(format!("record::id(id) = ${name}"));
        }
        Some(KeyFilter::Many(ids)) => {
            let name = push_bind(binds, Value::from(ids.clone()));
            clauses.push(format!("record::id(id) IN ${name}"));
        }
        None => {}
    }

    for filter in &plan.filters {
        let path = PropertyPath::resolve::<E>(&filter.field)?;
        let expr = if path.is_local() {
            path.dotted()
        } else {
            scalar_expr(path.segments())
        };
        clauses.push(render_condition(&expr, filter, binds));
    }

    if !plan.bypass_default_filters {
        if let Some(field) = E::soft_delete_field() {
            clauses.push(absent(field));
        }
    }

    Ok(clauses)
}

// absent covers both NONE (field never written) and NULL (written as null)
fn absent(field: &str) -> String {
    format!("({field} IS NONE OR {field} IS NULL)")
}

fn render_condition(
    expr: &str,
    filter: &FilterCondition,
    binds: &mut Vec<(String, Value)>,
) -> String {
    match filter.operator {
        FilterOperator::IsNull => absent(expr),
        FilterOperator::IsNotNull => format!("({expr} IS NOT NONE AND {expr} IS NOT NULL)"),
        FilterOperator::Like => {
            let name = push_bind(binds, bind_json(&filter.value));
            format!("{expr} ~ ${name}")
        }
        FilterOperator::In => {
            let name = push_bind(binds, bind_json(&filter.value));
            format!("{expr} IN ${name}")
        }
        op => {
            let name = push_bind(binds, bind_json(&filter.value));
            format!("{expr} {op} ${name}")
        }
    }
}

fn push_bind(binds: &mut Vec<(String, Value)>, value: Value) -> String {
    let name = format!("p{}", binds.len() + 1);
    binds.push((name.clone(), value));
    name
}

/// Scalar subquery for a nested property path
fn scalar_expr(segments: &[PathSegment]) -> String {
    let segment = &segments[0];
    match &segment.relation {
        None => segment.name.to_string(),
        Some(relation) => {
            let inner = scalar_expr(&segments[1..]);
            format!(
                "(SELECT VALUE {inner} FROM {} WHERE record::id(id) = $parent.{})[0]",
                relation.target, relation.foreign_key
            )
        }
    }
}

fn render_chain(steps: &[IncludeStep]) -> String {
    let step = &steps[0];
    let mut projection = String::from("*, record::id(id) AS id");
    if steps.len() > 1 {
        projection.push_str(", ");
        projection.push_str(&render_chain(&steps[1..]));
    }

    match step.kind {
        RelationKind::One => format!(
            "(SELECT {projection} FROM {} WHERE record::id(id) = $parent.{})[0] AS {}",
            step.target, step.foreign_key, step.field
        ),
        RelationKind::Many => format!(
            "(SELECT {projection} FROM {} WHERE {} = record::id($parent.id)) AS {}",
            step.target, step.foreign_key, step.field
        ),
    }
}

/// `CREATE` with an explicit record id; bind names carry the statement's
/// position in the batch
pub(crate) fn render_create(table: &str, suffix: usize) -> String {
    format!("CREATE type::thing('{table}', $k{suffix}) CONTENT $d{suffix} RETURN NONE")
}

/// Whole-document `UPDATE` by record id
pub(crate) fn render_update(table: &str, suffix: usize) -> String {
    format!("UPDATE type::thing('{table}', $k{suffix}) CONTENT $d{suffix} RETURN NONE")
}

/// `DELETE` by record id
pub(crate) fn render_delete(table: &str, suffix: usize) -> String {
    format!("DELETE type::thing('{table}', $k{suffix}) RETURN NONE")
}

/// `DEFINE INDEX` for a declared indexed field
pub(crate) fn render_define_index(table: &str, field: &str, unique: bool) -> String {
    let mut text = format!("DEFINE INDEX idx_{table}_{field} ON TABLE {table} FIELDS {field}");
    if unique {
        text.push_str(" UNIQUE");
    }
    text
}

/// Serialize an entity to the document bound into writes; the identity
/// lives in the record id and navigation fields are not stored
pub(crate) fn entity_document<E: Entity>(
    entity: &E,
    operation: RepositoryOperation,
) -> RepositoryResult<Value> {
    let mut value = serde_json::to_value(entity).map_err(|e| {
        RepositoryError::serialization_error(operation, e.to_string())
            .with_entity(E::TABLE, entity.key().to_string())
    })?;
    if let Value::Object(ref mut object) = value {
        object.remove(E::KEY);
        for field in E::fields().iter().filter(|f| f.relation.is_some()) {
            object.remove(field.name);
        }
    }
    Ok(value)
}
