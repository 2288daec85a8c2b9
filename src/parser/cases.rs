//! Edge case catalogue for the registration endpoint.
//!
//! Each case posts a malformed payload and expects the server's error
//! message to contain a given substring. Built-in catalogues exist per
//! variant; a YAML file can replace them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use crate::error::FlowError;
use crate::utils::config::Variant;

/// How an expected substring is compared to the server message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    CaseSensitive,
    CaseInsensitive,
}

impl MatchMode {
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Complete => MatchMode::CaseSensitive,
            Variant::Final => MatchMode::CaseInsensitive,
        }
    }

    pub fn matches(&self, message: &str, expected: &str) -> bool {
        match self {
            MatchMode::CaseSensitive => message.contains(expected),
            MatchMode::CaseInsensitive => message.to_lowercase().contains(&expected.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCase {
    pub name: String,
    /// Registration payload; string values may hold `${email}` style placeholders
    pub payload: Value,
    pub expect_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCaseSet {
    pub match_mode: MatchMode,
    pub cases: Vec<EdgeCase>,
}

/// On-disk shape of a cases file
#[derive(Debug, Deserialize)]
struct CasesFile {
    #[serde(default, rename = "match")]
    match_mode: Option<MatchMode>,
    cases: Vec<EdgeCase>,
}

impl EdgeCaseSet {
    pub fn builtin(variant: Variant) -> Self {
        let mut cases = vec![
            case(
                "Missing email",
                json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "${password}"
                }),
                "L'email est obligatoire",
            ),
            case(
                "Short password",
                json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "email": "short@example.com",
                    "password": "123"
                }),
                "8 caractères",
            ),
        ];

        match variant {
            Variant::Final => cases.push(case(
                "Missing first name",
                json!({
                    "last_name": "User",
                    "email": "noname@example.com",
                    "password": "${password}"
                }),
                "prénom est obligatoire",
            )),
            Variant::Complete => cases.push(case(
                "Invalid email",
                json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "email": "invalid-email",
                    "password": "${password}"
                }),
                "Format d'email invalide",
            )),
        }

        cases.push(case(
            "Duplicate email",
            json!({
                "first_name": "Test",
                "last_name": "User",
                "email": "${email}",
                "password": "${password}"
            }),
            "déjà utilisé",
        ));

        Self {
            match_mode: MatchMode::for_variant(variant),
            cases,
        }
    }

    /// Load from YAML; a missing `match` key keeps the variant's mode
    pub fn from_yaml_str(content: &str, variant: Variant) -> Result<Self, String> {
        let file: CasesFile = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        if file.cases.is_empty() {
            return Err("no cases defined".to_string());
        }
        if let Some(bad) = file.cases.iter().find(|c| !c.payload.is_object()) {
            return Err(format!("payload of case '{}' is not a mapping", bad.name));
        }
        Ok(Self {
            match_mode: file
                .match_mode
                .unwrap_or_else(|| MatchMode::for_variant(variant)),
            cases: file.cases,
        })
    }

    pub fn load(path: &Path, variant: Variant) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowError::Cases {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&content, variant).map_err(|reason| FlowError::Cases {
            path: path.display().to_string(),
            reason,
        })
    }
}

fn case(name: &str, payload: Value, expect_message: &str) -> EdgeCase {
    EdgeCase {
        name: name.to_string(),
        payload,
        expect_message: expect_message.to_string(),
    }
}
