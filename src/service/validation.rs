//! Request validation from descriptor rules. The contract: either pass
//! through an accepted, normalized body (defaults applied, unknown fields
//! stripped) or fail with every violation reported at once — never partial.

use crate::case::to_camel_case;
use crate::config::{ResolvedResource, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    pub fn apply(
        resource: &ResolvedResource,
        body: &mut Map<String, Value>,
    ) -> Result<(), AppError> {
        body.retain(|k, _| resource.column(k).is_some());
        for (col, rule) in &resource.validation {
            if let Some(default) = &rule.default {
                if !body.contains_key(col) {
                    body.insert(col.clone(), default.clone());
                }
            }
        }
        let violations = Self::violations(resource, body);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(violations.join("; ")))
        }
    }

    /// All rule violations, in field order.
    fn violations(resource: &ResolvedResource, body: &Map<String, Value>) -> Vec<String> {
        let mut rules: Vec<(&String, &ValidationRule)> = resource.validation.iter().collect();
        rules.sort_by_key(|(col, _)| col.as_str());

        let mut out = Vec::new();
        for (col, rule) in rules {
            let field = to_camel_case(col);
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                out.push(format!("{} is required", field));
            }
            if let Some(v) = val {
                check_field(&field, v, rule, &mut out);
            }
        }
        out
    }
}

fn check_field(field: &str, v: &Value, rule: &ValidationRule, out: &mut Vec<String>) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        check_format(field, v, format, out);
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.len() > max as usize {
                out.push(format!("{} must be at most {} characters", field, max));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.len() < min as usize {
                out.push(format!("{} must be at least {} characters", field, min));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        out.push(format!("{} does not match required pattern", field));
                    }
                }
            }
            Err(_) => out.push(format!("invalid pattern for {}", field)),
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            out.push(format!(
                "{} must be one of: {:?}",
                field,
                allowed.iter().take(5).collect::<Vec<_>>()
            ));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                out.push(format!("{} must be at least {}", field, min));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                out.push(format!("{} must be at most {}", field, max));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(field: &str, v: &Value, format: &str, out: &mut Vec<String>) {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    out.push(format!("{} must be a valid email", field));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    out.push(format!("{} must be a valid UUID", field));
                }
            }
        }
        _ => {}
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

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn accepted_body_passes_through_normalized() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let mut map = body(serde_json::json!({
            "first_name": "Ada",
            "email": "ada@example.com",
            "unknown_field": 1
        }));
        RequestValidator::apply(user, &mut map).unwrap();
        assert!(map.get("unknown_field").is_none());
    }

    #[test]
    fn all_violations_reported_at_once() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let mut map = body(serde_json::json!({
            "first_name": "A",
            "email": "nope",
            "age": -3
        }));
        let err = RequestValidator::apply(user, &mut map).unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("age must be at least 0"));
        assert!(msg.contains("email must be a valid email"));
        assert!(msg.contains("firstName must be at least 2 characters"));
    }

    #[test]
    fn missing_required_field_is_a_violation() {
        let model = model();
        let user = model.resource_by_path("user").unwrap();
        let mut map = body(serde_json::json!({ "first_name": "Ada" }));
        let err = RequestValidator::apply(user, &mut map).unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("email is required"));
    }

    #[test]
    fn defaults_are_applied_on_accept() {
        let mut config = catalog();
        config.resources[0]
            .validation
            .get_mut("age")
            .unwrap()
            .default = Some(serde_json::json!(18));
        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        let mut map = body(serde_json::json!({
            "first_name": "Ada",
            "email": "ada@example.com"
        }));
        RequestValidator::apply(user, &mut map).unwrap();
        assert_eq!(map["age"], serde_json::json!(18));
    }
}
