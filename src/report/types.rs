use serde::{Deserialize, Serialize};

use crate::runner::context::RegisteredAccount;
use crate::runner::state::{RunPhase, RunSummary, ScenarioStep};
use crate::utils::config::Variant;

/// Serializable record of one run, written at the end of the flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub variant: Variant,
    pub base_url: String,
    pub test_email: String,
    pub test_phone: String,
    pub timestamp: String,
    pub phase: RunPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegisteredAccount>,
    /// Verification used the fixed placeholder code instead of the delivered OTP
    pub placeholder_otp: bool,
    pub session_authenticated: bool,
    pub steps: Vec<ScenarioStep>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn step(&self, name: &str) -> Option<&ScenarioStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}
