//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved
//! resource. Identifiers come only from validated config; request values are
//! always bound as parameters.

use crate::config::{ColumnInfo, PopulateSpec, ResolvedResource};
use crate::query::{FilterCond, FilterExpr, SearchExpr};
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

fn cast_placeholder(n: usize, column: Option<&ColumnInfo>) -> String {
    match column {
        Some(c) => format!("${}::{}", n, c.pg_type()),
        None => format!("${}", n),
    }
}

/// Projection column list: the per-operation keys plus the id, or every
/// column when no keys are configured.
fn projected_names(all: &[String], keys: &[String]) -> Vec<String> {
    if keys.is_empty() {
        return all.to_vec();
    }
    let mut out = vec!["id".to_string()];
    for key in keys {
        if !out.contains(key) && all.contains(key) {
            out.push(key.clone());
        }
    }
    out
}

/// SELECT parts for one level: projected columns, with populated relation
/// fields replaced by their expansion subqueries.
fn projection_parts(
    all: &[String],
    keys: &[String],
    populate: &[PopulateSpec],
    alias: &str,
    schema: &str,
    level: usize,
) -> Vec<String> {
    let projected = projected_names(all, keys);
    let mut parts = Vec::new();
    for name in &projected {
        if populate.iter().any(|spec| spec.field == *name) {
            continue;
        }
        parts.push(format!("{}.{} AS {}", alias, quoted(name), quoted(name)));
    }
    for spec in populate {
        if !projected.contains(&spec.field) {
            continue;
        }
        let subquery = populate_subquery(spec, alias, schema, level + 1);
        parts.push(format!("{} AS {}", subquery, quoted(&spec.field)));
    }
    parts
}

/// One relation expansion as a scalar subquery: `row_to_json` for a single
/// reference, `json_agg` over `= ANY(...)` for a multi-valued one. Nested
/// specs recurse; depth was bounded at resolution.
fn populate_subquery(spec: &PopulateSpec, parent_alias: &str, schema: &str, level: usize) -> String {
    let t = format!("t{}", level);
    let a = format!("a{}", level);
    let inner_parts = projection_parts(
        &spec.target_columns,
        &spec.select,
        &spec.nested,
        &t,
        schema,
        level,
    );
    let table = qualified_table(schema, &spec.target_table);
    let join = if spec.many {
        format!("{}.{} = ANY({}.{})", t, quoted("id"), parent_alias, quoted(&spec.field))
    } else {
        format!("{}.{} = {}.{}", t, quoted("id"), parent_alias, quoted(&spec.field))
    };
    let inner = format!(
        "SELECT {} FROM {} {} WHERE {}",
        inner_parts.join(", "),
        table,
        t,
        join
    );
    if spec.many {
        format!(
            "(SELECT COALESCE(json_agg(row_to_json({a})), '[]'::json) FROM ({inner}) {a})",
            a = a,
            inner = inner
        )
    } else {
        format!("(SELECT row_to_json({a}) FROM ({inner}) {a})", a = a, inner = inner)
    }
}

fn push_filter_parts(q: &mut QueryBuf, resource: &ResolvedResource, filter: &FilterExpr) -> Vec<String> {
    let mut parts = Vec::new();
    for (field, cond) in &filter.conds {
        let column = resource.column(field);
        let lhs = format!("{}.{}", MAIN_ALIAS, quoted(field));
        match cond {
            FilterCond::Eq(v) => {
                let n = q.push_param(v.clone());
                parts.push(format!("{} = {}", lhs, cast_placeholder(n, column)));
            }
            FilterCond::In(values) => {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| {
                        let n = q.push_param(v.clone());
                        cast_placeholder(n, column)
                    })
                    .collect();
                parts.push(format!("{} IN ({})", lhs, placeholders.join(", ")));
            }
            FilterCond::Range(range) => {
                for (op, value) in [
                    (">=", &range.gte),
                    ("<=", &range.lte),
                    (">", &range.gt),
                    ("<", &range.lt),
                ] {
                    if let Some(v) = value {
                        let n = q.push_param(v.clone());
                        parts.push(format!("{} {} {}", lhs, op, cast_placeholder(n, column)));
                    }
                }
            }
        }
    }
    parts
}

fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_search_part(q: &mut QueryBuf, search: &SearchExpr) -> String {
    let op = if search.case_sensitive { "LIKE" } else { "ILIKE" };
    let pattern = format!("%{}%", escape_like(&search.keyword));
    let mut ors = Vec::new();
    for field in &search.fields {
        let n = q.push_param(Value::String(pattern.clone()));
        ors.push(format!("{}.{}::text {} ${}", MAIN_ALIAS, quoted(field), op, n));
    }
    format!("({})", ors.join(" OR "))
}

/// SELECT for list: projection + populate, filter AND search predicates,
/// ORDER BY id, optional LIMIT/OFFSET.
pub fn select_list(
    resource: &ResolvedResource,
    filter: &FilterExpr,
    search: Option<&SearchExpr>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let all = column_names(resource);
    let parts = projection_parts(
        &all,
        &resource.settings.list_fields,
        &resource.settings.list.populate,
        MAIN_ALIAS,
        &resource.schema_name,
        0,
    );

    let mut where_parts = push_filter_parts(&mut q, resource, filter);
    if let Some(search) = search {
        if !search.fields.is_empty() {
            where_parts.push(push_search_part(&mut q, search));
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(1000))).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}.{}{}{}",
        parts.join(", "),
        qualified_table(&resource.schema_name, &resource.table_name),
        MAIN_ALIAS,
        where_clause,
        MAIN_ALIAS,
        quoted("id"),
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT one document by id with the get-by-id projection and populate tree.
pub fn select_by_id(resource: &ResolvedResource, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let all = column_names(resource);
    let parts = projection_parts(
        &all,
        &resource.settings.get_by_id_fields,
        &resource.settings.get_by_id.populate,
        MAIN_ALIAS,
        &resource.schema_name,
        0,
    );
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} {} WHERE {}.{} = ${}",
        parts.join(", "),
        qualified_table(&resource.schema_name, &resource.table_name),
        MAIN_ALIAS,
        MAIN_ALIAS,
        quoted("id"),
        n
    );
    q
}

/// SELECT id and one column for every row whose column equals the value.
/// Used by the primary-key guard on single writes.
pub fn select_by_column_eq(resource: &ResolvedResource, column_name: &str, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let column = resource.column(column_name);
    let n = q.push_param(value.clone());
    q.sql = format!(
        "SELECT {}, {} FROM {} WHERE {} = {}",
        quoted("id"),
        quoted(column_name),
        qualified_table(&resource.schema_name, &resource.table_name),
        quoted(column_name),
        cast_placeholder(n, column)
    );
    q
}

/// SELECT id and one column for every row whose column is in the value set.
/// Used by the primary-key guard on bulk inserts.
pub fn select_by_column_in(
    resource: &ResolvedResource,
    column_name: &str,
    values: &[Value],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);
    if values.is_empty() {
        q.sql = format!(
            "SELECT {}, {} FROM {} WHERE 1 = 0",
            quoted("id"),
            quoted(column_name),
            table
        );
        return q;
    }
    let column = resource.column(column_name);
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| {
            let n = q.push_param(v.clone());
            cast_placeholder(n, column)
        })
        .collect();
    q.sql = format!(
        "SELECT {}, {} FROM {} WHERE {} IN ({})",
        quoted("id"),
        quoted(column_name),
        table,
        quoted(column_name),
        placeholders.join(", ")
    );
    q
}

/// INSERT from body: columns in model order; id and timestamps fall back to
/// their DB defaults when absent from the body.
pub fn insert(resource: &ResolvedResource, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for column in &resource.columns {
        let val = body.get(&column.name).cloned();
        if val.is_none() && has_db_default(column) {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&column.name));
        placeholders.push(cast_placeholder(n, Some(column)));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(&resource.schema_name, &resource.table_name),
        cols.join(", "),
        placeholders.join(", "),
        returning_list(resource)
    );
    q
}

/// UPDATE by id: SET only columns present in body, stamp updated_at.
pub fn update(resource: &ResolvedResource, id: &Value, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);
    let mut sets = Vec::new();
    for column in &resource.columns {
        if column.name == "id" || column.name == "created_at" || column.name == "updated_at" {
            continue;
        }
        let Some(v) = body.get(&column.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&column.name), cast_placeholder(n, Some(column))));
    }
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        table,
        sets.join(", "),
        quoted("id"),
        id_param,
        returning_list(resource)
    );
    q
}

/// DELETE by id, returning the deleted row.
pub fn delete(resource: &ResolvedResource, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${} RETURNING {}",
        qualified_table(&resource.schema_name, &resource.table_name),
        quoted("id"),
        n,
        returning_list(resource)
    );
    q
}

fn column_names(resource: &ResolvedResource) -> Vec<String> {
    resource.columns.iter().map(|c| c.name.clone()).collect()
}

fn returning_list(resource: &ResolvedResource) -> String {
    resource
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn has_db_default(column: &ColumnInfo) -> bool {
    matches!(column.name.as_str(), "id" | "created_at" | "updated_at")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::catalog;
    use crate::config::{resolve, ResolvedModel};
    use crate::query::{parse_list_query, FilterExpr};

    fn model() -> ResolvedModel {
        resolve(&catalog()).unwrap()
    }

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn list_projection_restricts_to_keys_plus_id() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = select_list(user, &FilterExpr::default(), None, None, None);
        assert!(q.sql.starts_with(
            "SELECT main.\"id\" AS \"id\", main.\"first_name\" AS \"first_name\", \
             main.\"last_name\" AS \"last_name\", main.\"email\" AS \"email\" \
             FROM \"restmint\".\"users\" main"
        ));
        assert!(!q.sql.contains("\"age\""));
    }

    #[test]
    fn empty_keys_mean_full_document() {
        let model = model();
        let department = model.resource_by_path("department").unwrap();
        // deprecated listFields on the fixture restricts to name
        let q = select_list(department, &FilterExpr::default(), None, None, None);
        assert!(q.sql.contains("main.\"name\" AS \"name\""));
        assert!(!q.sql.contains("created_at"));

        let q = select_by_id(department, &serde_json::json!("x"));
        assert!(q.sql.contains("\"created_at\" AS \"created_at\""));
    }

    #[test]
    fn range_filter_compiles_to_and_comparisons() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let query = parse_list_query(
            user,
            &pairs(&[("filter[age][gte]", "18"), ("filter[age][lte]", "30")]),
        );
        let q = select_list(user, &query.filter, None, None, None);
        assert!(q.sql.contains("WHERE main.\"age\" >= $1::bigint AND main.\"age\" <= $2::bigint"));
        assert_eq!(q.params, vec![serde_json::json!(18), serde_json::json!(30)]);
    }

    #[test]
    fn membership_filter_compiles_to_in() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let query = parse_list_query(
            user,
            &pairs(&[("filter[email]", "a@x.io"), ("filter[email]", "b@x.io")]),
        );
        let q = select_list(user, &query.filter, None, None, None);
        assert!(q.sql.contains("main.\"email\" IN ($1::text, $2::text)"));
    }

    #[test]
    fn search_compiles_to_or_group_with_pattern_params() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let query = parse_list_query(user, &pairs(&[("search", "john")]));
        let q = select_list(user, &query.filter, query.search.as_ref(), None, None);
        assert!(q.sql.contains(
            "(main.\"first_name\"::text ILIKE $1 OR main.\"last_name\"::text ILIKE $2)"
        ));
        assert_eq!(q.params[0], serde_json::json!("%john%"));
    }

    #[test]
    fn case_sensitive_search_uses_like() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let query = parse_list_query(user, &pairs(&[("search", "John"), ("caseSensitive", "true")]));
        let q = select_list(user, &query.filter, query.search.as_ref(), None, None);
        assert!(q.sql.contains("LIKE $1"));
        assert!(!q.sql.contains("ILIKE"));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let query = parse_list_query(user, &pairs(&[("search", "50%_off")]));
        let q = select_list(user, &query.filter, query.search.as_ref(), None, None);
        assert_eq!(q.params[0], serde_json::json!("%50\\%\\_off%"));
    }

    #[test]
    fn get_by_id_embeds_populate_subquery() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = select_by_id(user, &serde_json::json!("00000000-0000-0000-0000-000000000001"));
        assert!(q.sql.contains("(SELECT row_to_json(a1) FROM (SELECT"));
        assert!(q.sql.contains("t1.\"id\" = main.\"department\"") );
        assert!(q.sql.contains(") a1) AS \"department\""));
        // the raw uuid column is replaced by the expansion
        assert!(!q.sql.contains("main.\"department\" AS \"department\""));
    }

    #[test]
    fn many_populate_uses_json_agg_over_any() {
        let mut config = catalog();
        let settings = config.resources[0].settings.as_mut().unwrap();
        let list = settings.list.as_mut().unwrap();
        list.keys = None; // full projection so populated fields are included
        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        let q = select_list(user, &FilterExpr::default(), None, None, None);
        assert!(q.sql.contains("COALESCE(json_agg(row_to_json(a1)), '[]'::json)"));
        assert!(q.sql.contains("t1.\"id\" = ANY(main.\"teams\")"));
        // nested expansion one level deeper correlates to t1
        assert!(q.sql.contains("t2.\"id\" = t1.\"department\""));
    }

    #[test]
    fn populate_of_unprojected_field_is_omitted() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        // list keys are firstName/lastName/email: department is not projected
        let q = select_list(user, &FilterExpr::default(), None, None, None);
        assert!(!q.sql.contains("row_to_json"));
    }

    #[test]
    fn insert_uses_defaults_for_absent_id_and_timestamps() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let body = serde_json::json!({"first_name": "Ada", "email": "ada@x.io"});
        let q = insert(user, body.as_object().unwrap());
        assert!(q.sql.starts_with("INSERT INTO \"restmint\".\"users\" (\"first_name\""));
        let cols_part = q.sql.split(" VALUES ").next().unwrap();
        assert!(!cols_part.contains("\"id\""));
        assert!(!cols_part.contains("\"created_at\""));
        assert!(q.sql.contains("$1::text"));
        assert!(q.sql.contains("RETURNING \"id\""));
    }

    #[test]
    fn update_sets_only_present_columns_and_stamps_updated_at() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let body = serde_json::json!({"last_name": "Lovelace"});
        let id = serde_json::json!("00000000-0000-0000-0000-000000000001");
        let q = update(user, &id, body.as_object().unwrap());
        assert!(q.sql.contains("SET \"last_name\" = $1::text, \"updated_at\" = NOW()"));
        assert!(q.sql.contains("WHERE \"id\" = $2"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn delete_returns_the_deleted_row() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = delete(user, &serde_json::json!("00000000-0000-0000-0000-000000000001"));
        assert!(q.sql.starts_with("DELETE FROM \"restmint\".\"users\" WHERE \"id\" = $1 RETURNING"));
    }

    #[test]
    fn column_in_lookup_lists_placeholders() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let values = vec![serde_json::json!("a@x.io"), serde_json::json!("b@x.io")];
        let q = select_by_column_in(user, "email", &values);
        assert!(q.sql.contains("WHERE \"email\" IN ($1::text, $2::text)"));
        let q = select_by_column_in(user, "email", &[]);
        assert!(q.sql.contains("WHERE 1 = 0"));
    }
}
