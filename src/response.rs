//! Standard response envelope: `{success, statusCode, message, data}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug)]
pub struct Envelope {
    pub success: bool,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
    pub data: Value,
    /// Violation text or offending key values; only set on failures that carry detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

pub fn success_ok(message: impl Into<String>, data: Value) -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::OK,
        Json(Envelope {
            success: true,
            status_code: 200,
            message: message.into(),
            data,
            error: None,
        }),
    )
}

pub fn success_created(message: impl Into<String>, data: Value) -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            status_code: 201,
            message: message.into(),
            data,
            error: None,
        }),
    )
}

pub fn failure(status_code: u16, message: impl Into<String>, error: Option<Value>) -> Envelope {
    Envelope {
        success: false,
        status_code,
        message: message.into(),
        data: Value::Null,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_camel_case_status() {
        let (_, Json(body)) = success_ok("User fetched successfully", serde_json::json!({"a": 1}));
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["success"], serde_json::json!(true));
        assert_eq!(v["statusCode"], serde_json::json!(200));
        assert_eq!(v["data"]["a"], serde_json::json!(1));
        assert!(v.get("error").is_none());
    }

    #[test]
    fn failure_carries_error_detail() {
        let body = failure(400, "Validation error", Some(serde_json::json!("email is required")));
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["statusCode"], serde_json::json!(400));
        assert_eq!(v["data"], Value::Null);
        assert_eq!(v["error"], serde_json::json!("email is required"));
    }
}
