//! In-process mock of the registration API used by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// Knobs for the mock server
#[derive(Clone)]
pub struct MockBehavior {
    pub healthy: bool,
    /// The only OTP the verify endpoint accepts
    pub accepted_otp: String,
    /// Include `data.token` in successful logins
    pub issue_token: bool,
    /// Valid registrations fail with HTTP 500
    pub reject_registration: bool,
    /// Unverified accounts may log in and get a token
    pub allow_unverified_login: bool,
    /// Error messages come back upper-cased
    pub shout_errors: bool,
    /// Resend answers `application/json` with a body that does not parse
    pub malformed_resend: bool,
    /// Registration validation errors come back as unparsable JSON
    pub malformed_validation_errors: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            healthy: true,
            accepted_otp: "424242".to_string(),
            issue_token: true,
            reject_registration: false,
            allow_unverified_login: false,
            shout_errors: false,
            malformed_resend: false,
            malformed_validation_errors: false,
        }
    }
}

struct Account {
    id: u64,
    password: String,
    verified: bool,
}

/// A request seen by the mock: route and Authorization header
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub route: String,
    pub authorization: Option<String>,
}

pub struct MockState {
    behavior: MockBehavior,
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, String>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl MockState {
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    fn track(&self, route: &str, headers: &HeaderMap) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.seen.lock().unwrap().push(SeenRequest {
            route: route.to_string(),
            authorization,
        });
    }

    fn error(&self, status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
        let message = if self.behavior.shout_errors {
            message.to_uppercase()
        } else {
            message.to_string()
        };
        (status, Json(json!({ "success": false, "message": message })))
    }

    fn validation_error(&self, message: &str) -> Response {
        if self.behavior.malformed_validation_errors {
            return malformed();
        }
        self.error(StatusCode::BAD_REQUEST, message).into_response()
    }
}

/// Claims to be JSON but is not
fn malformed() -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], "{not json").into_response()
}

type Shared = Arc<MockState>;

/// Start the mock on an ephemeral port; returns its base URL
pub async fn spawn(behavior: MockBehavior) -> (String, Shared) {
    let state = Arc::new(MockState {
        behavior,
        accounts: Mutex::new(HashMap::new()),
        tokens: Mutex::new(HashMap::new()),
        seen: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/login", post(login))
        .route("/api/auth/resend-otp", post(resend_otp))
        .route("/api/users/profile", get(profile))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Base URL of a port nothing listens on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

async fn health(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    state.track("/health", &headers);
    if state.behavior.healthy {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        )
    }
}

async fn register(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.track("/api/auth/register", &headers);

    if str_field(&body, "first_name").is_none() {
        return state.validation_error("Le prénom est obligatoire");
    }
    let Some(email) = str_field(&body, "email") else {
        return state.validation_error("L'email est obligatoire");
    };
    if !email.contains('@') {
        return state.validation_error("Format d'email invalide");
    }
    let password = str_field(&body, "password").unwrap_or_default();
    if password.chars().count() < 8 {
        return state.validation_error("Le mot de passe doit contenir au moins 8 caractères");
    }
    if state.behavior.reject_registration {
        return state
            .error(StatusCode::INTERNAL_SERVER_ERROR, "Erreur interne")
            .into_response();
    }

    let mut accounts = state.accounts.lock().unwrap();
    if accounts.contains_key(email) {
        if state.behavior.malformed_validation_errors {
            return malformed();
        }
        return state
            .error(StatusCode::CONFLICT, "Cet email est déjà utilisé")
            .into_response();
    }
    let id = accounts.len() as u64 + 1;
    accounts.insert(
        email.to_string(),
        Account {
            id,
            password: password.to_string(),
            verified: false,
        },
    );

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Inscription réussie",
            "data": {
                "person": { "id": id },
                "user": { "id": id + 100 },
                "otp": { "id": id + 1000 }
            }
        })),
    )
        .into_response()
}

async fn verify_email(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.track("/api/auth/verify-email", &headers);

    let email = str_field(&body, "email").unwrap_or_default();
    let otp = str_field(&body, "otp_code").unwrap_or_default();

    let mut accounts = state.accounts.lock().unwrap();
    let Some(account) = accounts.get_mut(email) else {
        return state.error(StatusCode::NOT_FOUND, "Utilisateur introuvable");
    };
    if otp != state.behavior.accepted_otp {
        return state.error(StatusCode::BAD_REQUEST, "Code OTP invalide ou expiré");
    }
    account.verified = true;

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Email vérifié" })),
    )
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.track("/api/auth/login", &headers);

    let email = str_field(&body, "email").unwrap_or_default().to_string();
    let password = str_field(&body, "password").unwrap_or_default();

    let (id, verified) = {
        let accounts = state.accounts.lock().unwrap();
        match accounts.get(&email) {
            Some(a) if a.password == password => (a.id, a.verified),
            _ => return state.error(StatusCode::UNAUTHORIZED, "Identifiants invalides"),
        }
    };

    // Unverified accounts get a 200 that still reports failure
    if !verified && !state.behavior.allow_unverified_login {
        return (
            StatusCode::OK,
            Json(json!({ "success": false, "message": "Email non vérifié" })),
        );
    }

    let mut data = json!({ "user": { "id": id + 100 } });
    if state.behavior.issue_token {
        let token = format!("token-{}-{}", id, uuid::Uuid::new_v4());
        state.tokens.lock().unwrap().insert(token.clone(), email);
        data["token"] = json!(token);
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Connexion réussie", "data": data })),
    )
}

async fn resend_otp(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.track("/api/auth/resend-otp", &headers);

    if state.behavior.malformed_resend {
        return malformed();
    }
    let email = str_field(&body, "email").unwrap_or_default();
    if !state.accounts.lock().unwrap().contains_key(email) {
        return state
            .error(StatusCode::NOT_FOUND, "Utilisateur introuvable")
            .into_response();
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Code OTP renvoyé" })),
    )
        .into_response()
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    state.track("/api/users/profile", &headers);

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let email = token.and_then(|t| state.tokens.lock().unwrap().get(&t).cloned());

    match email {
        Some(email) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Profil", "data": { "email": email } })),
        ),
        None => state.error(StatusCode::UNAUTHORIZED, "Token manquant ou invalide"),
    }
}
