use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::client::{Exchange, ResponseBody};
use crate::error::FlowError;

/// Recorded status of a scenario step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, StepStatus::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepStatus::Skipped { .. })
    }
}

/// Result of executing one step, before it is recorded.
///
/// `Fatal` aborts the run; the other two are recorded and the run continues.
#[derive(Debug)]
pub enum StepOutcome {
    Success {
        exchange: Option<Exchange>,
    },
    Failure {
        exchange: Option<Exchange>,
        error: String,
    },
    Fatal(FlowError),
}

impl StepOutcome {
    pub fn success(exchange: Exchange) -> Self {
        StepOutcome::Success {
            exchange: Some(exchange),
        }
    }

    pub fn failure(exchange: Exchange, error: impl Into<String>) -> Self {
        StepOutcome::Failure {
            exchange: Some(exchange),
            error: error.into(),
        }
    }

    /// Transport or decode error on a non-fatal step
    pub fn errored(err: FlowError) -> Self {
        StepOutcome::Failure {
            exchange: None,
            error: err.to_string(),
        }
    }
}

/// Outcome of a single edge case probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    pub case: String,
    pub success: bool,
    pub expected_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One request/response exchange with its pass/fail judgement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioStep {
    pub index: usize,
    pub name: String,
    /// What the step expects of the response
    pub expectation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    pub status: StepStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<ProbeResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Builder for a step while it runs; frozen into a [`ScenarioStep`] by `finish`
#[derive(Debug)]
pub struct StepRecorder {
    index: usize,
    name: String,
    expectation: String,
    request: Option<Value>,
    probes: Vec<ProbeResult>,
    notes: Vec<String>,
    started_at: Instant,
}

impl StepRecorder {
    pub fn new(index: usize, name: &str, expectation: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            expectation: expectation.to_string(),
            request: None,
            probes: Vec::new(),
            notes: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn request(mut self, payload: Value) -> Self {
        self.request = Some(payload);
        self
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn probe(&mut self, result: ProbeResult) {
        self.probes.push(result);
    }

    pub fn probes(&self) -> &[ProbeResult] {
        &self.probes
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Freeze a non-fatal outcome. Fatal outcomes never become steps.
    pub fn finish(self, outcome: StepOutcome) -> Result<ScenarioStep, FlowError> {
        let (status, exchange) = match outcome {
            StepOutcome::Success { exchange } => (StepStatus::Passed, exchange),
            StepOutcome::Failure { exchange, error } => (StepStatus::Failed { error }, exchange),
            StepOutcome::Fatal(err) => return Err(err),
        };
        let duration_ms = Some(self.elapsed_ms());
        Ok(self.build(status, exchange, duration_ms))
    }

    pub fn skip(self, reason: &str) -> ScenarioStep {
        self.build(
            StepStatus::Skipped {
                reason: reason.to_string(),
            },
            None,
            None,
        )
    }

    fn build(
        self,
        status: StepStatus,
        exchange: Option<Exchange>,
        duration_ms: Option<u64>,
    ) -> ScenarioStep {
        let (status_code, response) = match exchange {
            Some(ex) => (Some(ex.status), Some(ex.body)),
            None => (None, None),
        };
        ScenarioStep {
            index: self.index,
            name: self.name,
            expectation: self.expectation,
            request: self.request,
            success: status.is_passed(),
            status,
            status_code,
            response,
            probes: self.probes,
            notes: self.notes,
            duration_ms,
        }
    }
}

/// Progress of a run through the registration flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    NotStarted,
    Registered,
    RegisterFailed,
    EdgeCasesDone,
    Verified,
    VerifyFailed,
    LoggedIn,
    LoginFailed,
    Done,
}

impl RunPhase {
    /// Dependent steps only run once an account exists
    pub fn has_account(&self) -> bool {
        !matches!(self, RunPhase::NotStarted | RunPhase::RegisterFailed)
    }
}

/// Aggregate over all recorded steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub successful_steps: u32,
    pub total_steps: u32,
    pub skipped_steps: u32,
    pub success_rate: String,
    pub edge_cases_success: u32,
    pub edge_cases_total: u32,
    pub edge_cases_rate: String,
    pub overall_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl RunSummary {
    /// Skipped steps are reported but excluded from the rate
    pub fn from_steps(steps: &[ScenarioStep], pass_threshold: u8) -> Self {
        let mut successful_steps = 0;
        let mut total_steps = 0;
        let mut skipped_steps = 0;
        let mut edge_cases_success = 0;
        let mut edge_cases_total = 0;

        for step in steps {
            if step.status.is_skipped() {
                skipped_steps += 1;
                continue;
            }
            total_steps += 1;
            if step.success {
                successful_steps += 1;
            }
            for probe in &step.probes {
                edge_cases_total += 1;
                if probe.success {
                    edge_cases_success += 1;
                }
            }
        }

        Self {
            successful_steps,
            total_steps,
            skipped_steps,
            success_rate: format_rate(successful_steps, total_steps),
            edge_cases_success,
            edge_cases_total,
            edge_cases_rate: if edge_cases_total > 0 {
                format_rate(edge_cases_success, edge_cases_total)
            } else {
                "N/A".to_string()
            },
            overall_passed: meets_threshold(successful_steps, total_steps, pass_threshold),
            duration_ms: None,
        }
    }
}

/// `round(100 * passed / total, 1)` with one decimal and a trailing `%`
pub fn format_rate(passed: u32, total: u32) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", passed as f64 / total as f64 * 100.0)
}

pub fn meets_threshold(passed: u32, total: u32, threshold: u8) -> bool {
    total > 0 && passed as u64 * 100 >= threshold as u64 * total as u64
}
