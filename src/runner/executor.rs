use serde_json::{json, Value};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::context::{RegisteredAccount, RunContext};
use super::events::{EventEmitter, FlowEvent};
use super::state::{
    ProbeResult, RunPhase, RunSummary, ScenarioStep, StepOutcome, StepRecorder, StepStatus,
};
use crate::client::{
    ApiClient, Exchange, Session, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH, RESEND_OTP_PATH,
    VERIFY_EMAIL_PATH,
};
use crate::error::FlowError;
use crate::parser::cases::EdgeCaseSet;
use crate::report::types::RunReport;
use crate::utils::config::Config;
use crate::utils::identity::TestIdentity;

const STEP_REGISTRATION: &str = "registration";
const STEP_EDGE_CASES: &str = "edge_cases";
const STEP_LOGIN_BEFORE_VERIFICATION: &str = "login_before_verification";
const STEP_VERIFICATION: &str = "verification";
const STEP_LOGIN_AFTER_VERIFICATION: &str = "login_after_verification";
const STEP_PROTECTED_ENDPOINT: &str = "protected_endpoint";
const STEP_RESEND_OTP: &str = "resend_otp";

/// Steps that need a registered account, in execution order
const DEPENDENT_STEPS: [&str; 5] = [
    STEP_LOGIN_BEFORE_VERIFICATION,
    STEP_VERIFICATION,
    STEP_LOGIN_AFTER_VERIFICATION,
    STEP_PROTECTED_ENDPOINT,
    STEP_RESEND_OTP,
];

/// Executes the registration scenario against one server, in a fixed order
pub struct FlowRunner {
    config: Config,
    client: ApiClient,
    context: RunContext,
    cases: EdgeCaseSet,
    emitter: EventEmitter,
    phase: RunPhase,
    steps: Vec<ScenarioStep>,
    run_id: String,
}

impl FlowRunner {
    pub fn new(config: Config, cases: EdgeCaseSet, emitter: EventEmitter) -> Result<Self, FlowError> {
        Self::with_identity(config, cases, emitter, TestIdentity::generate())
    }

    pub fn with_identity(
        config: Config,
        cases: EdgeCaseSet,
        emitter: EventEmitter,
        identity: TestIdentity,
    ) -> Result<Self, FlowError> {
        let client = ApiClient::new(&config.base_url)?;
        let context = RunContext::new(identity, &config.password);

        Ok(Self {
            config,
            client,
            context,
            cases,
            emitter,
            phase: RunPhase::NotStarted,
            steps: Vec::new(),
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    /// Run every step and build the report.
    ///
    /// Only an unreachable or unhealthy server yields `Err`; every other
    /// failure is recorded on its step.
    pub async fn run(mut self) -> Result<RunReport, FlowError> {
        let started_at = Instant::now();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let StepOutcome::Fatal(err) = self.check_liveness().await {
            log::error!("liveness check failed: {}", err);
            return Err(err);
        }

        self.emitter.emit(FlowEvent::RunStarted {
            run_id: self.run_id.clone(),
            base_url: self.config.base_url.clone(),
            email: self.context.email().to_string(),
        });

        self.register().await?;
        self.probe_edge_cases().await?;

        if self.phase.has_account() {
            self.login_before_verification().await?;
            self.verify_email().await?;
            self.login_after_verification().await?;
            self.fetch_protected().await?;
            self.resend_otp().await?;
        } else {
            self.emitter
                .warn("Registration failed, skipping steps that need an account");
            for name in DEPENDENT_STEPS {
                self.skip(name, "registration failed");
            }
        }
        // REGISTER_FAILED is terminal and stays visible in the report
        if self.phase.has_account() {
            self.phase = RunPhase::Done;
        }

        let mut summary = RunSummary::from_steps(&self.steps, self.config.pass_threshold);
        summary.duration_ms = Some(started_at.elapsed().as_millis() as u64);

        self.emitter.emit(FlowEvent::RunFinished {
            summary: summary.clone(),
            threshold: self.config.pass_threshold,
        });

        Ok(RunReport {
            run_id: self.run_id,
            variant: self.config.variant,
            base_url: self.config.base_url,
            test_email: self.context.identity.email.clone(),
            test_phone: self.context.identity.phone.clone(),
            timestamp,
            phase: self.phase,
            registration: self.context.account,
            placeholder_otp: self.config.otp_code.is_none(),
            session_authenticated: self.client.session().is_authenticated(),
            steps: self.steps,
            summary,
        })
    }

    async fn check_liveness(&self) -> StepOutcome {
        let timeout = Duration::from_millis(self.config.health_timeout_ms);
        match self.client.check_health(timeout).await {
            Ok(()) => {
                log::info!("server reachable at {}", self.client.base_url());
                StepOutcome::Success { exchange: None }
            }
            Err(err) => StepOutcome::Fatal(err),
        }
    }

    async fn register(&mut self) -> Result<(), FlowError> {
        let identity = &self.context.identity;
        let payload = json!({
            "first_name": identity.first_name,
            "last_name": identity.last_name,
            "email": identity.email,
            "password": self.context.password,
            "phone": identity.phone,
        });

        let mut rec = self.start_step(STEP_REGISTRATION, "HTTP 200/201 with success: true")
            .request(redact(&payload));

        let outcome = match self.client.post_json(REGISTER_PATH, &payload).await {
            Ok(exchange) => judge(exchange, &[200, 201]),
            Err(err) => StepOutcome::errored(err),
        };

        if let StepOutcome::Success {
            exchange: Some(ref exchange),
        } = outcome
        {
            let account = RegisteredAccount {
                person_id: exchange.body.field("data.person.id"),
                user_id: exchange.body.field("data.user.id"),
                otp_id: exchange.body.field("data.otp.id"),
            };
            self.emitter.log(format!(
                "Person ID: {}, User ID: {}, OTP ID: {}",
                account.person_id.as_deref().unwrap_or("-"),
                account.user_id.as_deref().unwrap_or("-"),
                account.otp_id.as_deref().unwrap_or("-"),
            ));
            let missing = account.missing_ids();
            if !missing.is_empty() {
                let note = format!("response lacks {}", missing.join(", "));
                self.emitter.warn(note.clone());
                rec.note(note);
            }
            self.context.account = Some(account);
            self.phase = RunPhase::Registered;
        } else {
            self.phase = RunPhase::RegisterFailed;
        }

        self.record(rec, outcome)
    }

    async fn probe_edge_cases(&mut self) -> Result<(), FlowError> {
        let expectation = format!(
            "each error message contains its expected text ({:?})",
            self.cases.match_mode
        );
        let mut rec = self.start_step(STEP_EDGE_CASES, &expectation);
        let mode = self.cases.match_mode;

        for case in &self.cases.cases {
            let payload = self.context.render_payload(&case.payload);
            let probe = match self.client.post_json(REGISTER_PATH, &payload).await {
                Ok(Exchange { status, body }) => {
                    let message = body.message().unwrap_or_default();
                    let success = mode.matches(message, &case.expect_message);
                    ProbeResult {
                        case: case.name.clone(),
                        success,
                        expected_message: case.expect_message.clone(),
                        status_code: Some(status),
                        response: if success { None } else { Some(body) },
                        error: None,
                    }
                }
                Err(err) => ProbeResult {
                    case: case.name.clone(),
                    success: false,
                    expected_message: case.expect_message.clone(),
                    status_code: None,
                    response: None,
                    error: Some(err.to_string()),
                },
            };

            let detail = match (&probe.error, probe.success) {
                (Some(err), _) => format!("error: {}", err),
                (None, true) => "expected error detected".to_string(),
                (None, false) => format!(
                    "expected '{}', got {}",
                    case.expect_message,
                    probe
                        .response
                        .as_ref()
                        .and_then(|b| b.message())
                        .map(|m| format!("'{}'", m))
                        .unwrap_or_else(|| "no message".to_string())
                ),
            };
            self.emitter.emit(FlowEvent::ProbeFinished {
                case: probe.case.clone(),
                success: probe.success,
                detail,
            });
            rec.probe(probe);
        }

        let total = rec.probes().len();
        let failed = rec.probes().iter().filter(|p| !p.success).count();
        let outcome = if failed == 0 {
            StepOutcome::Success { exchange: None }
        } else {
            StepOutcome::Failure {
                exchange: None,
                error: format!("{} of {} edge cases failed", failed, total),
            }
        };

        if self.phase.has_account() {
            self.phase = RunPhase::EdgeCasesDone;
        }
        self.record(rec, outcome)
    }

    async fn login_before_verification(&mut self) -> Result<(), FlowError> {
        let payload = self.login_payload();
        let mut rec = self
            .start_step(
                STEP_LOGIN_BEFORE_VERIFICATION,
                "login refused while the email is unverified",
            )
            .request(redact(&payload));

        let outcome = match self.client.post_json(LOGIN_PATH, &payload).await {
            Ok(exchange) => {
                if exchange.status == 200 && exchange.body.success_flag() {
                    if self.adopt_token(&exchange) {
                        rec.note("session authorized by a login before verification");
                    }
                    StepOutcome::failure(exchange, "unverified account was allowed to log in")
                } else {
                    self.emitter.log(format!(
                        "Login refused as expected ({})",
                        exchange.describe_failure()
                    ));
                    StepOutcome::success(exchange)
                }
            }
            Err(err) => StepOutcome::errored(err),
        };

        self.record(rec, outcome)
    }

    async fn verify_email(&mut self) -> Result<(), FlowError> {
        let payload = json!({
            "email": self.context.email(),
            "otp_code": self.config.otp(),
        });
        let mut rec = self
            .start_step(STEP_VERIFICATION, "HTTP 200 with success: true")
            .request(payload.clone());

        if self.config.uses_placeholder_otp() {
            let note = format!(
                "placeholder OTP {} used; the delivered code was not retrieved",
                self.config.otp()
            );
            self.emitter.warn(note.clone());
            rec.note(note);
        }

        let outcome = match self.client.post_json(VERIFY_EMAIL_PATH, &payload).await {
            Ok(exchange) => judge(exchange, &[200]),
            Err(err) => StepOutcome::errored(err),
        };

        self.phase = if matches!(outcome, StepOutcome::Success { .. }) {
            RunPhase::Verified
        } else {
            RunPhase::VerifyFailed
        };
        self.record(rec, outcome)
    }

    async fn login_after_verification(&mut self) -> Result<(), FlowError> {
        let payload = self.login_payload();
        let mut rec = self
            .start_step(STEP_LOGIN_AFTER_VERIFICATION, "HTTP 200 with success: true")
            .request(redact(&payload));

        let outcome = match self.client.post_json(LOGIN_PATH, &payload).await {
            Ok(exchange) => {
                let outcome = judge(exchange, &[200]);
                if let StepOutcome::Success {
                    exchange: Some(ref exchange),
                } = outcome
                {
                    if !self.adopt_token(exchange) {
                        let note = "no data.token in response; session stays unauthenticated";
                        self.emitter.warn(note);
                        rec.note(note);
                    }
                }
                outcome
            }
            Err(err) => StepOutcome::errored(err),
        };

        self.phase = if matches!(outcome, StepOutcome::Success { .. }) {
            RunPhase::LoggedIn
        } else {
            RunPhase::LoginFailed
        };
        self.record(rec, outcome)
    }

    async fn fetch_protected(&mut self) -> Result<(), FlowError> {
        if !self.client.session().is_authenticated() {
            self.skip(STEP_PROTECTED_ENDPOINT, "no session token");
            return Ok(());
        }

        let rec = self.start_step(
            STEP_PROTECTED_ENDPOINT,
            "HTTP 200 with success: true using the bearer token",
        );
        let outcome = match self.client.get(PROFILE_PATH).await {
            Ok(exchange) => judge(exchange, &[200]),
            Err(err) => StepOutcome::errored(err),
        };
        self.record(rec, outcome)
    }

    async fn resend_otp(&mut self) -> Result<(), FlowError> {
        let payload = json!({ "email": self.context.email() });
        let rec = self
            .start_step(STEP_RESEND_OTP, "HTTP 200 with success: true")
            .request(payload.clone());

        let outcome = match self.client.post_json(RESEND_OTP_PATH, &payload).await {
            Ok(exchange) => judge(exchange, &[200]),
            Err(err) => StepOutcome::errored(err),
        };
        self.record(rec, outcome)
    }

    fn login_payload(&self) -> Value {
        json!({
            "email": self.context.email(),
            "password": self.context.password,
        })
    }

    /// Attach `data.token` to the session if the login succeeded and carried one
    fn adopt_token(&mut self, exchange: &Exchange) -> bool {
        if exchange.status != 200 || !exchange.body.success_flag() {
            return false;
        }
        match exchange.body.field("data.token") {
            Some(token) => {
                self.client.session_mut().authorize(&token);
                self.emitter.log("Bearer token attached to session");
                true
            }
            None => false,
        }
    }

    fn next_index(&self) -> usize {
        self.steps.len() + 1
    }

    fn start_step(&self, name: &str, expectation: &str) -> StepRecorder {
        let index = self.next_index();
        self.emitter.emit(FlowEvent::StepStarted {
            index,
            name: name.to_string(),
        });
        StepRecorder::new(index, name, expectation)
    }

    fn record(&mut self, rec: StepRecorder, outcome: StepOutcome) -> Result<(), FlowError> {
        let step = rec.finish(outcome)?;
        let duration_ms = step.duration_ms.unwrap_or(0);

        match &step.status {
            StepStatus::Passed => self.emitter.emit(FlowEvent::StepPassed {
                index: step.index,
                name: step.name.clone(),
                status_code: step.status_code,
                duration_ms,
            }),
            StepStatus::Failed { error } => {
                log::debug!("step {} failed: {}", step.name, error);
                self.emitter.emit(FlowEvent::StepFailed {
                    index: step.index,
                    name: step.name.clone(),
                    error: error.clone(),
                    status_code: step.status_code,
                    duration_ms,
                })
            }
            StepStatus::Skipped { reason } => self.emitter.emit(FlowEvent::StepSkipped {
                index: step.index,
                name: step.name.clone(),
                reason: reason.clone(),
            }),
        }

        self.steps.push(step);
        Ok(())
    }

    fn skip(&mut self, name: &str, reason: &str) {
        let step = StepRecorder::new(self.next_index(), name, "").skip(reason);
        self.emitter.emit(FlowEvent::StepSkipped {
            index: step.index,
            name: step.name.clone(),
            reason: reason.to_string(),
        });
        self.steps.push(step);
    }
}

/// Pass iff the status is accepted and the body says `success: true`
fn judge(exchange: Exchange, accepted: &[u16]) -> StepOutcome {
    if !accepted.contains(&exchange.status) {
        let error = exchange.describe_failure();
        return StepOutcome::failure(exchange, error);
    }
    if exchange.body.success_flag() {
        return StepOutcome::success(exchange);
    }
    let error = exchange
        .body
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| "response did not report success".to_string());
    StepOutcome::failure(exchange, error)
}

/// Mask password values before a payload lands in the report
fn redact(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if k.contains("password") {
                        (k.clone(), Value::String("********".to_string()))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
