//! Request-side query compilation: parse the `filter[...]`/`search` grammar
//! from query pairs, apply the per-resource allow-lists, and coerce values by
//! column type. The SQL side of the compilation lives in `sql::builder`.

use crate::case::to_snake_case;
use crate::config::{ColumnKind, ResolvedResource};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeCond {
    pub gte: Option<Value>,
    pub lte: Option<Value>,
    pub gt: Option<Value>,
    pub lt: Option<Value>,
}

impl RangeCond {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none() && self.gt.is_none() && self.lt.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterCond {
    Eq(Value),
    In(Vec<Value>),
    Range(RangeCond),
}

/// AND-combined field predicates; only allow-listed fields ever appear here.
#[derive(Clone, Debug, Default)]
pub struct FilterExpr {
    pub conds: Vec<(String, FilterCond)>,
}

/// OR-combined pattern match over the effective fields.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchExpr {
    pub keyword: String,
    pub case_sensitive: bool,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filter: FilterExpr,
    pub search: Option<SearchExpr>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Parse the list query pairs (order- and repeat-preserving) into the
/// compiled expressions for one resource.
pub fn parse_list_query(resource: &ResolvedResource, pairs: &[(String, String)]) -> ListQuery {
    let mut raw: Vec<(String, Vec<String>, Vec<(String, String)>)> = Vec::new();
    let mut keyword: Option<String> = None;
    let mut case_sensitive = false;
    let mut requested_fields: Option<Vec<String>> = None;
    let mut limit = None;
    let mut offset = None;

    for (key, value) in pairs {
        match key.as_str() {
            "search" => keyword = Some(value.clone()),
            "searchFields" => {
                requested_fields = Some(
                    value
                        .split(',')
                        .map(|s| to_snake_case(s.trim()))
                        .filter(|s| !s.is_empty())
                        .collect(),
                )
            }
            "caseSensitive" => case_sensitive = value.eq_ignore_ascii_case("true"),
            "limit" => limit = value.parse().ok(),
            "offset" => offset = value.parse().ok(),
            _ => {
                if let Some((field, op)) = parse_filter_key(key) {
                    let idx = match raw.iter().position(|(f, _, _)| *f == field) {
                        Some(i) => i,
                        None => {
                            raw.push((field, Vec::new(), Vec::new()));
                            raw.len() - 1
                        }
                    };
                    match op {
                        Some(op) => raw[idx].2.push((op, value.clone())),
                        None => raw[idx].1.push(value.clone()),
                    }
                }
            }
        }
    }

    ListQuery {
        filter: compile_filter(resource, raw),
        search: compile_search(resource, keyword, case_sensitive, requested_fields),
        limit,
        offset,
    }
}

/// `filter[age]` -> (age, None); `filter[age][gte]` -> (age, Some(gte)).
fn parse_filter_key(key: &str) -> Option<(String, Option<String>)> {
    let rest = key.strip_prefix("filter[")?;
    let close = rest.find(']')?;
    let field = &rest[..close];
    if field.is_empty() {
        return None;
    }
    let tail = &rest[close + 1..];
    if tail.is_empty() {
        return Some((to_snake_case(field), None));
    }
    let op = tail.strip_prefix('[')?.strip_suffix(']')?;
    Some((to_snake_case(field), Some(op.to_string())))
}

fn compile_filter(
    resource: &ResolvedResource,
    raw: Vec<(String, Vec<String>, Vec<(String, String)>)>,
) -> FilterExpr {
    let allowed = &resource.settings.list.filter_fields;
    let mut conds = Vec::new();
    for (field, values, ops) in raw {
        if !allowed.contains(&field) {
            tracing::debug!(field = %field, "filter field not allow-listed; dropped");
            continue;
        }
        let Some(column) = resource.column(&field) else {
            continue;
        };
        if !ops.is_empty() {
            let mut range = RangeCond::default();
            for (op, value) in ops {
                let Some(coerced) = coerce(column.kind, &value) else {
                    continue;
                };
                match op.as_str() {
                    "gte" => range.gte = Some(coerced),
                    "lte" => range.lte = Some(coerced),
                    "gt" => range.gt = Some(coerced),
                    "lt" => range.lt = Some(coerced),
                    // Unrecognized operators are dropped silently.
                    _ => {}
                }
            }
            if !range.is_empty() {
                conds.push((field, FilterCond::Range(range)));
            }
        } else {
            let coerced: Vec<Value> = values.iter().filter_map(|v| coerce(column.kind, v)).collect();
            match coerced.len() {
                0 => {}
                1 => conds.push((field, FilterCond::Eq(coerced.into_iter().next().unwrap()))),
                _ => conds.push((field, FilterCond::In(coerced))),
            }
        }
    }
    FilterExpr { conds }
}

/// Effective search fields: request-supplied intersected with the allow-list
/// when both are present; otherwise the allow-list alone; otherwise none.
fn compile_search(
    resource: &ResolvedResource,
    keyword: Option<String>,
    case_sensitive: bool,
    requested: Option<Vec<String>>,
) -> Option<SearchExpr> {
    let search = &resource.settings.list.search;
    if search.disabled {
        return None;
    }
    let keyword = keyword?;
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    let fields: Vec<String> = if search.fields.is_empty() {
        Vec::new()
    } else {
        match requested {
            Some(req) => req
                .into_iter()
                .filter(|f| search.fields.contains(f))
                .collect(),
            None => search.fields.clone(),
        }
    };
    if fields.is_empty() {
        tracing::warn!(
            resource = %resource.path_segment,
            "search skipped: no effective fields"
        );
        return None;
    }
    Some(SearchExpr {
        keyword: keyword.to_string(),
        case_sensitive,
        fields,
    })
}

fn coerce(kind: ColumnKind, value: &str) -> Option<Value> {
    match kind {
        ColumnKind::Integer => value.parse::<i64>().ok().map(Value::from),
        ColumnKind::Float => value.parse::<f64>().ok().map(Value::from),
        ColumnKind::Boolean => {
            if value.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if value.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        ColumnKind::Uuid => uuid::Uuid::parse_str(value)
            .ok()
            .map(|u| Value::String(u.to_string())),
        ColumnKind::Text | ColumnKind::Json | ColumnKind::Timestamp => {
            Some(Value::String(value.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::config::test_fixtures::catalog;
    use crate::config::ResolvedModel;

    fn model() -> ResolvedModel {
        resolve(&catalog()).unwrap()
    }

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn range_filter_on_allowed_field() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("filter[age][gte]", "18"), ("filter[age][lte]", "30")]));
        assert_eq!(q.filter.conds.len(), 1);
        let (field, cond) = &q.filter.conds[0];
        assert_eq!(field, "age");
        assert_eq!(
            *cond,
            FilterCond::Range(RangeCond {
                gte: Some(Value::from(18)),
                lte: Some(Value::from(30)),
                gt: None,
                lt: None,
            })
        );
    }

    #[test]
    fn non_allow_listed_field_is_dropped_silently() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("filter[firstName]", "Ada")]));
        assert!(q.filter.conds.is_empty());
    }

    #[test]
    fn repeated_values_become_set_membership() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(
            user,
            &pairs(&[("filter[email]", "a@x.io"), ("filter[email]", "b@x.io")]),
        );
        assert_eq!(
            q.filter.conds[0].1,
            FilterCond::In(vec![Value::from("a@x.io"), Value::from("b@x.io")])
        );
    }

    #[test]
    fn unrecognized_operator_is_dropped() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("filter[age][like]", "5")]));
        assert!(q.filter.conds.is_empty());
    }

    #[test]
    fn uncoercible_value_is_dropped() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("filter[age][gte]", "abc")]));
        assert!(q.filter.conds.is_empty());
        let q = parse_list_query(user, &pairs(&[("filter[active]", "maybe")]));
        assert!(q.filter.conds.is_empty());
    }

    #[test]
    fn boolean_and_exact_match() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("filter[active]", "true")]));
        assert_eq!(q.filter.conds[0].1, FilterCond::Eq(Value::Bool(true)));
    }

    #[test]
    fn search_uses_allow_list_when_no_fields_requested() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("search", "john")]));
        let search = q.search.unwrap();
        assert_eq!(search.fields, vec!["first_name".to_string(), "last_name".to_string()]);
        assert!(!search.case_sensitive);
    }

    #[test]
    fn requested_fields_intersect_allow_list() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(
            user,
            &pairs(&[("search", "john"), ("searchFields", "firstName,email")]),
        );
        assert_eq!(q.search.unwrap().fields, vec!["first_name".to_string()]);
    }

    #[test]
    fn case_sensitive_flag_is_honored() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("search", "John"), ("caseSensitive", "true")]));
        assert!(q.search.unwrap().case_sensitive);
    }

    #[test]
    fn search_without_allow_list_is_skipped() {
        let model = model();
        let department = model.resource_by_path("department").unwrap();
        let q = parse_list_query(
            department,
            &pairs(&[("search", "ops"), ("searchFields", "name")]),
        );
        assert!(q.search.is_none());
    }

    #[test]
    fn blank_keyword_is_skipped() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("search", "   ")]));
        assert!(q.search.is_none());
    }

    #[test]
    fn disabled_search_produces_no_predicate() {
        let mut config = catalog();
        let settings = config.resources[0].settings.as_mut().unwrap();
        settings.list.as_mut().unwrap().search.as_mut().unwrap().disabled = true;
        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("search", "john")]));
        assert!(q.search.is_none());
    }

    #[test]
    fn limit_and_offset_pass_through() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let q = parse_list_query(user, &pairs(&[("limit", "10"), ("offset", "20")]));
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.offset, Some(20));
    }
}
