//! Case conversion for the API boundary: request keys camelCase -> snake_case
//! (store columns), response keys snake_case -> camelCase (client). Also the
//! pluralization rule used to derive table names and list messages.

use serde_json::{Map, Value};

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "first_name" -> "firstName", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "firstName" -> "first_name", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Plural form of a word: "category" -> "categories", "box" -> "boxes",
/// "user" -> "users".
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return word.to_string();
    }
    let lower = word.to_lowercase();
    if lower.ends_with('y') {
        let before = lower.as_bytes()[lower.len().saturating_sub(2)] as char;
        if !matches!(before, 'a' | 'e' | 'i' | 'o' | 'u') {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suf| lower.ends_with(suf)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Convert all keys of a JSON object from camelCase to snake_case (in place).
/// Used for request bodies so field names match store column names.
pub fn object_keys_to_snake_case(obj: &mut Map<String, Value>) {
    let keys: Vec<String> = obj.keys().cloned().collect();
    for k in keys {
        let snake = to_snake_case(&k);
        if snake != k {
            if let Some(v) = obj.remove(&k) {
                obj.insert(snake, v);
            }
        }
    }
}

/// Recursively apply camelCase to all object keys in a Value (objects and
/// arrays of objects). Used on responses, including populated sub-documents.
pub fn value_keys_to_camel_case_recursive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for k in keys {
                let camel = to_camel_case(&k);
                if camel != k {
                    if let Some(v) = map.remove(&k) {
                        map.insert(camel, v);
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                value_keys_to_camel_case_recursive(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_and_snake_round() {
        assert_eq!(to_camel_case("first_name"), "firstName");
        assert_eq!(to_snake_case("firstName"), "first_name");
        assert_eq!(to_snake_case("id"), "id");
    }

    #[test]
    fn pluralize_rules() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("branch"), "branches");
    }

    #[test]
    fn response_keys_camelized_recursively() {
        let mut v = serde_json::json!({
            "first_name": "Ada",
            "department": {"created_at": "x"},
            "items": [{"sub_total": 1}]
        });
        value_keys_to_camel_case_recursive(&mut v);
        assert!(v.get("firstName").is_some());
        assert!(v["department"].get("createdAt").is_some());
        assert!(v["items"][0].get("subTotal").is_some());
    }
}
