use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::utils::identity::TestIdentity;

/// Identifiers returned by a successful registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAccount {
    pub person_id: Option<String>,
    pub user_id: Option<String>,
    pub otp_id: Option<String>,
}

impl RegisteredAccount {
    pub fn missing_ids(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.person_id.is_none() {
            missing.push("data.person.id");
        }
        if self.user_id.is_none() {
            missing.push("data.user.id");
        }
        if self.otp_id.is_none() {
            missing.push("data.otp.id");
        }
        missing
    }
}

/// Per-run values shared by the scenario steps
pub struct RunContext {
    pub identity: TestIdentity,
    pub password: String,
    pub account: Option<RegisteredAccount>,
    vars: HashMap<String, String>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([a-zA-Z0-9_]+)\}").expect("static regex"))
}

impl RunContext {
    pub fn new(identity: TestIdentity, password: &str) -> Self {
        let mut vars = HashMap::new();
        vars.insert("email".to_string(), identity.email.clone());
        vars.insert("phone".to_string(), identity.phone.clone());
        vars.insert("first_name".to_string(), identity.first_name.clone());
        vars.insert("last_name".to_string(), identity.last_name.clone());
        vars.insert("password".to_string(), password.to_string());

        Self {
            identity,
            password: password.to_string(),
            account: None,
            vars,
        }
    }

    pub fn email(&self) -> &str {
        &self.identity.email
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Replace `${name}` patterns; unknown names are left untouched
    pub fn substitute_vars(&self, text: &str) -> String {
        placeholder_re()
            .replace_all(text, |caps: &regex::Captures| match self.get_var(&caps[1]) {
                Some(val) => val.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Substitute placeholders in every string of a JSON payload
    pub fn render_payload(&self, payload: &Value) -> Value {
        match payload {
            Value::String(s) => Value::String(self.substitute_vars(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.render_payload(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_payload(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RunContext {
        RunContext::new(
            TestIdentity {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: "test_1_abcdef@example.com".to_string(),
                phone: "+33612345678".to_string(),
            },
            "TestPassword123!",
        )
    }

    #[test]
    fn test_substitute_vars() {
        let ctx = context();
        assert_eq!(
            ctx.substitute_vars("${email} / ${password}"),
            "test_1_abcdef@example.com / TestPassword123!"
        );
        assert_eq!(ctx.substitute_vars("${unknown}"), "${unknown}");
        assert_eq!(ctx.substitute_vars("plain"), "plain");
    }

    #[test]
    fn test_render_payload() {
        let ctx = context();
        let rendered = ctx.render_payload(&json!({
            "email": "${email}",
            "password": "123",
            "tags": ["${phone}"],
            "age": 3
        }));
        assert_eq!(
            rendered,
            json!({
                "email": "test_1_abcdef@example.com",
                "password": "123",
                "tags": ["+33612345678"],
                "age": 3
            })
        );
    }

    #[test]
    fn test_missing_ids() {
        let account = RegisteredAccount {
            person_id: Some("1".to_string()),
            user_id: None,
            otp_id: Some("9".to_string()),
        };
        assert_eq!(account.missing_ids(), vec!["data.user.id"]);
    }
}
