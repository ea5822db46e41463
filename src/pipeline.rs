//! Ordered request-interceptor chains. Each resource descriptor names its
//! middlewares; they are resolved against a registry at registration time and
//! composed into one pipeline per route. Validation is just one named
//! interceptor in that list, appended automatically when the descriptor
//! carries a validation schema and the chain does not name it explicitly.

use crate::config::ResolvedResource;
use crate::error::{AppError, ConfigError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Body interceptor: may normalize the body in place or short-circuit the
/// request with an error.
pub type Interceptor =
    Arc<dyn Fn(&ResolvedResource, &mut Map<String, Value>) -> Result<(), AppError> + Send + Sync>;

/// Name of the built-in validation interceptor.
pub const VALIDATE: &str = "validate";

#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<(String, Interceptor)>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pipeline").field(&self.step_names()).finish()
    }
}

impl Pipeline {
    pub fn run(
        &self,
        resource: &ResolvedResource,
        body: &mut Map<String, Value>,
    ) -> Result<(), AppError> {
        for (name, step) in &self.steps {
            tracing::debug!(step = %name, resource = %resource.path_segment, "interceptor");
            step(resource, body)?;
        }
        Ok(())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Named interceptors available to resource descriptors. Consumers register
/// their own before calling `resolve_with`.
pub struct MiddlewareRegistry {
    interceptors: HashMap<String, Interceptor>,
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        let mut registry = MiddlewareRegistry {
            interceptors: HashMap::new(),
        };
        registry.register("trim", Arc::new(trim_strings));
        registry
    }
}

impl MiddlewareRegistry {
    pub fn register(&mut self, name: impl Into<String>, interceptor: Interceptor) {
        self.interceptors.insert(name.into(), interceptor);
    }

    pub(crate) fn build_pipeline(
        &self,
        names: &[String],
        has_validation: bool,
    ) -> Result<Pipeline, ConfigError> {
        let mut steps: Vec<(String, Interceptor)> = Vec::new();
        let mut validate_placed = false;
        for name in names {
            if name == VALIDATE {
                steps.push((VALIDATE.into(), validation_step()));
                validate_placed = true;
            } else {
                let interceptor = self.interceptors.get(name).cloned().ok_or_else(|| {
                    ConfigError::MissingReference {
                        kind: "middleware",
                        id: name.clone(),
                    }
                })?;
                steps.push((name.clone(), interceptor));
            }
        }
        if has_validation && !validate_placed {
            steps.push((VALIDATE.into(), validation_step()));
        }
        Ok(Pipeline { steps })
    }
}

fn validation_step() -> Interceptor {
    Arc::new(|resource, body| crate::service::RequestValidator::apply(resource, body))
}

/// Built-in interceptor: trim surrounding whitespace from string values.
fn trim_strings(_resource: &ResolvedResource, body: &mut Map<String, Value>) -> Result<(), AppError> {
    for (_, v) in body.iter_mut() {
        if let Value::String(s) = v {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *v = Value::String(trimmed.to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve;
    use crate::config::test_fixtures::catalog;

    #[test]
    fn validation_appended_when_schema_present() {
        let model = resolve(&catalog()).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert_eq!(user.pipeline.step_names(), vec![VALIDATE]);
        let department = model.resource_by_path("department").unwrap();
        assert!(department.pipeline.step_names().is_empty());
    }

    #[test]
    fn named_middlewares_run_in_order() {
        let mut config = catalog();
        config.resources[0].middlewares = vec!["trim".into(), VALIDATE.into()];
        let model = resolve(&config).unwrap();
        let user = model.resource_by_path("user").unwrap();
        assert_eq!(user.pipeline.step_names(), vec!["trim", VALIDATE]);

        let mut body = serde_json::json!({
            "first_name": "  Ada  ",
            "email": "ada@example.com"
        });
        let map = body.as_object_mut().unwrap();
        user.pipeline.run(user, map).unwrap();
        assert_eq!(map["first_name"], serde_json::json!("Ada"));
    }

    #[test]
    fn unknown_middleware_aborts_registration() {
        let mut config = catalog();
        config.resources[0].middlewares = vec!["audit".into()];
        assert!(matches!(
            resolve(&config),
            Err(ConfigError::MissingReference { kind: "middleware", .. })
        ));
    }
}
