//! Scenario-scoped execution state

use indexmap::IndexMap;
use serde_json::Value;

use crate::browser::Page;
use crate::common::config::Config;
use crate::http::{Credential, HttpResponse};
use crate::script::Bindings;

/// Shared starting point for every execution context
#[derive(Debug, Clone, Default)]
pub struct ContextTemplate {
    pub headers: IndexMap<String, String>,
    pub verify_tls: bool,
    /// Environment bindings every iteration starts from
    pub vars: Bindings,
}

impl ContextTemplate {
    pub fn from_config(config: &Config, env: Bindings) -> Self {
        Self {
            headers: config.api.default_headers(),
            verify_tls: config.api.verify_ssl,
            vars: env,
        }
    }

    /// A fresh context with the dataset row merged over the template vars
    pub fn instantiate(&self, row: &Bindings) -> ExecutionContext {
        let mut vars = self.vars.clone();
        vars.extend(row.iter().map(|(k, v)| (k.clone(), v.clone())));

        ExecutionContext {
            base_url: String::new(),
            request_body: None,
            headers: self.headers.clone(),
            credential: None,
            verify_tls: self.verify_tls,
            response: None,
            vars,
            last_method: None,
            page: None,
            page_opened: false,
        }
    }
}

/// Mutable state threaded through one scenario's steps
///
/// Exactly one exists per (scenario, iteration) pair. It is dropped when the
/// scenario ends; nothing in it reaches the next scenario.
pub struct ExecutionContext {
    pub base_url: String,
    pub request_body: Option<Value>,
    pub headers: IndexMap<String, String>,
    pub credential: Option<Credential>,
    pub verify_tls: bool,
    pub response: Option<HttpResponse>,
    pub vars: Bindings,
    pub last_method: Option<String>,
    pub page: Option<Box<dyn Page>>,
    /// Set once a `driver` step opened a page, even if it was closed since
    pub page_opened: bool,
}

impl ExecutionContext {
    /// Parsed body of the last response
    pub fn response_json(&self) -> Option<&Value> {
        self.response.as_ref().and_then(|r| r.json.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_overrides_env_and_contexts_do_not_share() {
        let mut env = Bindings::new();
        env.insert("BASE_URL".to_string(), json!("http://env"));
        env.insert("user".to_string(), json!("env-user"));
        let template = ContextTemplate::from_config(&Config::default(), env);

        let mut row = Bindings::new();
        row.insert("user".to_string(), json!("row-user"));

        let mut first = template.instantiate(&row);
        assert_eq!(first.vars["user"], json!("row-user"));
        assert_eq!(first.vars["BASE_URL"], json!("http://env"));

        first.vars.insert("token".to_string(), json!("abc"));
        first.headers.insert("X-Leak".to_string(), "1".to_string());

        let second = template.instantiate(&Bindings::new());
        assert!(!second.vars.contains_key("token"));
        assert!(!second.headers.contains_key("X-Leak"));
        assert_eq!(second.vars["user"], json!("env-user"));
    }
}
