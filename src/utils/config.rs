use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3007";
pub const DEFAULT_PASSWORD: &str = "TestPassword123!";

/// OTP sent to the verify endpoint when no real code is injected.
/// The runner never reads the delivered code, so a real server rejects this
/// unless it accepts a fixed test code.
pub const PLACEHOLDER_OTP: &str = "123456";

/// Scenario flavour. Selects the edge case catalogue, how expected
/// messages are matched and the results file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Case-sensitive matching, probes an invalid email format
    Complete,
    /// Case-insensitive matching, probes a missing first name
    Final,
}

impl Variant {
    pub fn results_file_prefix(&self) -> &'static str {
        match self {
            Variant::Complete => "test_results",
            Variant::Final => "test_results_final",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Complete => "complete",
            Variant::Final => "final",
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "complete" => Ok(Variant::Complete),
            "final" => Ok(Variant::Final),
            other => Err(format!("unknown variant: {}", other)),
        }
    }
}

/// Run configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server root, without trailing slash
    pub base_url: String,

    /// Password used for registration and both logins
    pub password: String,

    /// Real OTP to verify with; `None` falls back to [`PLACEHOLDER_OTP`]
    pub otp_code: Option<String>,

    pub variant: Variant,

    /// Optional YAML file replacing the built-in edge cases
    pub cases_file: Option<PathBuf>,

    /// Bounded wait for the liveness probe (ms)
    pub health_timeout_ms: u64,

    /// Minimum success rate (percent) for the run to pass
    pub pass_threshold: u8,

    /// Directory receiving the results file
    pub output_dir: PathBuf,

    /// Also write a JUnit XML report
    pub junit: bool,
}

impl Config {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn otp(&self) -> &str {
        self.otp_code.as_deref().unwrap_or(PLACEHOLDER_OTP)
    }

    pub fn uses_placeholder_otp(&self) -> bool {
        self.otp_code.is_none()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            otp_code: None,
            variant: Variant::Final,
            cases_file: None,
            health_timeout_ms: 5000,
            pass_threshold: 80,
            output_dir: PathBuf::from("."),
            junit: false,
        }
    }
}
