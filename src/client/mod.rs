//! HTTP client for the registration API.
//!
//! Wraps a single `reqwest::Client` plus the session credential so the
//! bearer token acquired at login rides along on every later request.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::FlowError;

pub const HEALTH_PATH: &str = "/health";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const VERIFY_EMAIL_PATH: &str = "/api/auth/verify-email";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const RESEND_OTP_PATH: &str = "/api/auth/resend-otp";
pub const PROFILE_PATH: &str = "/api/users/profile";

/// Authorization state carried across requests of one run
#[derive(Debug, Default, Clone)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn authorize(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn authorization_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }
}

/// Response body as observed on the wire.
///
/// Untagged, with `Text` first so a saved text body reads back as `Text`.
/// A JSON body that is a bare string is kept as `Text` for the same reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
}

impl ResponseBody {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Text(_) => None,
        }
    }

    /// Top-level `success` flag; anything but a literal `true` counts as false
    pub fn success_flag(&self) -> bool {
        self.json()
            .and_then(|v| v.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn message(&self) -> Option<&str> {
        self.json()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
    }

    /// Value at a dotted path such as `data.person.id`, rendered as a string
    pub fn field(&self, path: &str) -> Option<String> {
        let pointer = format!("/{}", path.replace('.', "/"));
        let value = self.json()?.pointer(&pointer)?;
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One observed request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub status: u16,
    pub body: ResponseBody,
}

impl Exchange {
    /// Short failure description: `HTTP 409: Cet email est déjà utilisé`
    pub fn describe_failure(&self) -> String {
        match self.body.message() {
            Some(msg) => format!("HTTP {}: {}", self.status, msg),
            None => format!("HTTP {}", self.status),
        }
    }
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, FlowError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("regflow-tester/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session: Session::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Probe the health endpoint with a bounded wait
    pub async fn check_health(&self, timeout: Duration) -> Result<(), FlowError> {
        let url = self.url(HEALTH_PATH);
        log::debug!("GET {} (timeout {:?})", url, timeout);

        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FlowError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FlowError::Unhealthy { url, status });
        }
        Ok(())
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Exchange, FlowError> {
        let url = self.url(path);
        log::debug!("POST {} {}", url, body);

        let mut req = self.http.post(&url).json(body);
        if let Some(auth) = self.session.authorization_header() {
            req = req.header(AUTHORIZATION, auth);
        }
        Self::read(req.send().await?).await
    }

    pub async fn get(&self, path: &str) -> Result<Exchange, FlowError> {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let mut req = self.http.get(&url);
        if let Some(auth) = self.session.authorization_header() {
            req = req.header(AUTHORIZATION, auth);
        }
        Self::read(req.send().await?).await
    }

    async fn read(response: reqwest::Response) -> Result<Exchange, FlowError> {
        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/json"));
        let text = response.text().await?;
        log::debug!("<- {} {}", status, text);

        Ok(Exchange {
            status,
            body: parse_body(is_json, &text)?,
        })
    }
}

/// JSON content types must parse; anything else is kept as raw text
fn parse_body(is_json: bool, text: &str) -> Result<ResponseBody, FlowError> {
    if is_json {
        match serde_json::from_str(text)? {
            Value::String(s) => Ok(ResponseBody::Text(s)),
            value => Ok(ResponseBody::Json(value)),
        }
    } else {
        Ok(ResponseBody::Text(text.to_string()))
    }
}
