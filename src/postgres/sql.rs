//! SQL rendering for the PostgreSQL adapter
//!
//! Every read is rendered as a single-column SELECT whose one column,
//! `data`, is the entity row folded into `jsonb` (`to_jsonb`) with each
//! navigation load merged in as a correlated subquery. The repository then
//! deserializes `data` through serde, which is what keeps the adapter free
//! of per-entity column mappings. Writes run through
//! `jsonb_populate_record` for the same reason.
//!
//! Navigation joins assume related tables key on `id`, the [`Schema::KEY`]
//! default. Filter values are always bound (`$n`), never spliced.

use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};

use crate::entity::{Entity, RelationKind, Schema};
use crate::query::plan::{IncludeStep, OrderKey, QueryPlan};
use crate::query::{FilterCondition, FilterOperator, FilterValue, PropertyPath};
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Rendered SQL text plus its ordered bind values
#[derive(Debug, Clone)]
pub(crate) struct SqlQuery {
    pub sql: String,
    pub binds: Vec<FilterValue>,
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
    pub offset: Option<i64>,
    pub for_update: bool,
    /// Flip every ordering direction (for `last`)
    pub reverse: bool,
}

struct Aliases(u32);

impl Aliases {
    fn next(&mut self) -> String {
        self.0 += 1;
        format!("t{}", self.0)
    }
}

/// Render a plan to a `SELECT ... AS data` query
pub(crate) fn render_select<E: Entity>(
    plan: &QueryPlan,
    params: &SelectParams,
) -> RepositoryResult<SqlQuery> {
    plan.check()?;

    let mut aliases = Aliases(0);
    let mut binds = Vec::new();

    let mut projection = String::from("to_jsonb(t0)");
    for chain in plan.distinct_includes() {
        projection.push_str(" || ");
        projection.push_str(&render_chain(&chain.steps, "t0", &mut aliases));
    }

    let mut sql = format!("SELECT {projection} AS data FROM {} t0", E::TABLE);

    let clauses = where_clauses::<E>(plan, params.key_filter.as_ref(), &mut binds, &mut aliases)?;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let order = order_clauses::<E>(plan, params.reverse, &mut aliases)?;
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    if let Some(limit) = params.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = params.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    if params.for_update {
        sql.push_str(" FOR UPDATE OF t0");
    }

    Ok(SqlQuery { sql, binds })
}

/// Render a plan to a `SELECT count(*)` query
pub(crate) fn render_count<E: Entity>(
    filters: &[FilterCondition],
    bypass_default_filters: bool,
) -> RepositoryResult<SqlQuery> {
    let mut plan = QueryPlan::default();
    plan.filters = filters.to_vec();
    plan.bypass_default_filters = bypass_default_filters;

    let mut aliases = Aliases(0);
    let mut binds = Vec::new();
    let mut sql = format!("SELECT count(*) FROM {} t0", E::TABLE);

    let clauses = where_clauses::<E>(&plan, None, &mut binds, &mut aliases)?;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    Ok(SqlQuery { sql, binds })
}

fn where_clauses<E: Entity>(
    plan: &QueryPlan,
    key_filter: Option<&KeyFilter>,
    binds: &mut Vec<FilterValue>,
    aliases: &mut Aliases,
) -> RepositoryResult<Vec<String>> {
    let mut clauses = Vec::new();

    match key_filter {
        Some(KeyFilter::One(id)) => {
            binds.push(FilterValue::String(id.clone()));
            clauses.push(format!("t0.{}::text = ${}", E::KEY, binds.len()));
        }
        Some(KeyFilter::Many(ids)) => {
            binds.push(FilterValue::StringList(ids.clone()));
            clauses.push(format!("t0.{}::text = ANY(${})", E::KEY, binds.len()));
        }
        None => {}
    }

    for filter in &plan.filters {
        let path = PropertyPath::resolve::<E>(&filter.field)?;
        let expr = path_expr(&path, aliases);
        clauses.push(render_condition(&expr, filter, binds));
    }

    if !plan.bypass_default_filters {
        if let Some(column) = E::soft_delete_field() {
            clauses.push(format!("t0.{column} IS NULL"));
        }
    }

    Ok(clauses)
}

fn render_condition(
    expr: &str,
    filter: &FilterCondition,
    binds: &mut Vec<FilterValue>,
) -> String {
    match filter.operator {
        FilterOperator::IsNull => format!("{expr} IS NULL"),
        FilterOperator::IsNotNull => format!("{expr} IS NOT NULL"),
        FilterOperator::In => {
            binds.push(filter.value.clone());
            format!("{expr} = ANY(${})", binds.len())
        }
        op => {
            binds.push(filter.value.clone());
            format!("{expr} {op} ${}", binds.len())
        }
    }
}

fn order_clauses<E: Entity>(
    plan: &QueryPlan,
    reverse: bool,
    aliases: &mut Aliases,
) -> RepositoryResult<Vec<String>> {
    let mut clauses = Vec::new();

    if plan.order.is_empty() {
        if reverse {
            clauses.push(format!("t0.{} DESC", E::KEY));
        }
        return Ok(clauses);
    }

    for spec in &plan.order {
        let expr = match &spec.key {
            OrderKey::Natural => format!("t0.{}", E::KEY),
            OrderKey::Path(path) => path_expr(path, aliases),
        };
        let direction = if reverse {
            spec.direction.reversed()
        } else {
            spec.direction
        };
        clauses.push(format!("{expr} {direction}"));
    }

    Ok(clauses)
}

/// Scalar expression for a resolved property path; nested paths become
/// correlated scalar subqueries
fn path_expr(path: &PropertyPath, aliases: &mut Aliases) -> String {
    nest(path.segments(), "t0", aliases)
}

fn nest(
    segments: &[crate::query::path::PathSegment],
    parent: &str,
    aliases: &mut Aliases,
) -> String {
    let segment = &segments[0];
    match &segment.relation {
        None => format!("{parent}.{}", segment.name),
        Some(relation) => {
            let alias = aliases.next();
            let inner = nest(&segments[1..], &alias, aliases);
            format!(
                "(SELECT {inner} FROM {} {alias} WHERE {alias}.id = {parent}.{})",
                relation.target, relation.foreign_key
            )
        }
    }
}

fn render_chain(steps: &[IncludeStep], parent: &str, aliases: &mut Aliases) -> String {
    let step = &steps[0];
    let alias = aliases.next();

    let mut projection = format!("to_jsonb({alias})");
    if steps.len() > 1 {
        projection.push_str(" || ");
        projection.push_str(&render_chain(&steps[1..], &alias, aliases));
    }

    match step.kind {
        RelationKind::One => format!(
            "jsonb_build_object('{}', (SELECT {projection} FROM {} {alias} \
             WHERE {alias}.id = {parent}.{}))",
            step.field, step.target, step.foreign_key
        ),
        RelationKind::Many => format!(
            "jsonb_build_object('{}', coalesce((SELECT jsonb_agg({projection}) FROM {} {alias} \
             WHERE {alias}.{} = {parent}.id), '[]'::jsonb))",
            step.field, step.target, step.foreign_key
        ),
    }
}

/// `INSERT` through `jsonb_populate_record`; binds the entity document
pub(crate) fn render_insert<E: Entity>() -> String {
    format!(
        "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1)",
        table = E::TABLE
    )
}

/// `UPDATE` of every scalar non-key column from the entity document
pub(crate) fn render_update<E: Entity>() -> String {
    let columns: Vec<&str> = E::fields()
        .iter()
        .filter(|f| f.relation.is_none() && f.name != E::KEY)
        .map(|f| f.name)
        .collect();
    let targets = columns.join(", ");
    let sources = columns
        .iter()
        .map(|c| format!("r.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} SET ({targets}) = \
         (SELECT {sources} FROM jsonb_populate_record(NULL::{table}, $1) r) \
         WHERE {table}.{key}::text = $2",
        table = E::TABLE,
        key = E::KEY
    )
}

/// `DELETE` by identity
pub(crate) fn render_delete<E: Entity>() -> String {
    format!("DELETE FROM {} WHERE {}::text = $1", E::TABLE, E::KEY)
}

/// Serialize an entity to the document bound into writes, stripping
/// navigation fields (they are not columns)
pub(crate) fn entity_document<E: Entity>(
    entity: &E,
    operation: RepositoryOperation,
) -> RepositoryResult<Value> {
    let mut value = serde_json::to_value(entity).map_err(|e| {
        RepositoryError::serialization_error(operation, e.to_string())
            .with_entity(E::TABLE, entity.key().to_string())
    })?;
    if let Value::Object(ref mut object) = value {
        for field in E::fields().iter().filter(|f| f.relation.is_some()) {
            object.remove(field.name);
        }
    }
    Ok(value)
}

/// Bind an ordered value list onto a query
pub(crate) fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: &[FilterValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in binds {
        query = match value {
            FilterValue::String(s) => query.bind(s.clone()),
            FilterValue::Integer(n) => query.bind(*n),
            FilterValue::Float(n) => query.bind(*n),
            FilterValue::Boolean(b) => query.bind(*b),
            FilterValue::Uuid(u) => query.bind(*u),
            FilterValue::DateTime(t) => query.bind(*t),
            FilterValue::StringList(list) => query.bind(list.clone()),
            FilterValue::IntegerList(list) => query.bind(list.clone()),
            FilterValue::Json(v) => query.bind(v.clone()),
            FilterValue::Null => query.bind(None::<String>),
        };
    }
    query
}

/// Decode one raw-query column to JSON by its Postgres type name
pub(crate) fn pg_value_to_json(row: &PgRow, index: usize) -> RepositoryResult<Value> {
    fn get<'r, T>(row: &'r PgRow, index: usize) -> RepositoryResult<Option<T>>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(index)
            .map_err(|e| RepositoryError::serialization_error(RepositoryOperation::RawQuery, e.to_string()))
    }

    let type_name = row.columns()[index].type_info().name().to_uppercase();
    let value = match type_name.as_str() {
        "BOOL" => get::<bool>(row, index)?.map(Value::from),
        "INT2" => get::<i16>(row, index)?.map(Value::from),
        "INT4" => get::<i32>(row, index)?.map(Value::from),
        "INT8" => get::<i64>(row, index)?.map(Value::from),
        "FLOAT4" => get::<f32>(row, index)?.map(Value::from),
        "FLOAT8" => get::<f64>(row, index)?.map(Value::from),
        "UUID" => get::<uuid::Uuid>(row, index)?.map(|u| Value::from(u.to_string())),
        "TIMESTAMPTZ" => {
            get::<chrono::DateTime<chrono::Utc>>(row, index)?.map(|t| Value::from(t.to_rfc3339()))
        }
        "TIMESTAMP" => {
            get::<chrono::NaiveDateTime>(row, index)?.map(|t| Value::from(t.to_string()))
        }
        "DATE" => get::<chrono::NaiveDate>(row, index)?.map(|d| Value::from(d.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, index)?,
        _ => get::<String>(row, index)?.map(Value::from),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode a whole raw-query row to a JSON object keyed by column name
pub(crate) fn row_to_json(row: &PgRow) -> RepositoryResult<Value> {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), pg_value_to_json(row, index)?);
    }
    Ok(Value::Object(object))
}

/// Split a multi-mapping row into `parts` JSON objects at occurrences of
/// the split column. The first object starts at column zero; each later
/// occurrence of `split_on` (case-insensitive) starts the next object. A
/// segment whose columns are all null collapses to JSON null.
pub(crate) fn split_row(row: &PgRow, split_on: &str, parts: usize) -> RepositoryResult<Vec<Value>> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        columns.push((column.name().to_string(), pg_value_to_json(row, index)?));
    }
    split_columns(columns, split_on, parts)
}

pub(crate) fn split_columns(
    columns: Vec<(String, Value)>,
    split_on: &str,
    parts: usize,
) -> RepositoryResult<Vec<Value>> {
    let mut boundaries = vec![0_usize];
    for (index, (name, _)) in columns.iter().enumerate().skip(1) {
        if name.eq_ignore_ascii_case(split_on) {
            boundaries.push(index);
        }
    }

    if boundaries.len() < parts {
        return Err(RepositoryError::invalid_argument(format!(
            "result set splits into {} segment(s) on `{split_on}`, but {parts} were requested",
            boundaries.len()
        ))
        .with_operation(RepositoryOperation::RawQuery));
    }
    boundaries.truncate(parts);
    boundaries.push(columns.len());

    let mut segments = Vec::with_capacity(parts);
    for window in boundaries.windows(2) {
        let mut object = serde_json::Map::new();
        let mut all_null = true;
        for (name, value) in &columns[window[0]..window[1]] {
            all_null &= value.is_null();
            object.insert(name.clone(), value.clone());
        }
        segments.push(if all_null {
            Value::Null
        } else {
            Value::Object(object)
        });
    }
    Ok(segments)
}
