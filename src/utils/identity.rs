//! Throwaway identities for registration runs.
//!
//! Emails combine the unix timestamp with a random suffix so that two runs
//! started in the same second still register distinct accounts.

use rand::Rng;
use serde::{Deserialize, Serialize};

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl TestIdentity {
    pub fn generate() -> Self {
        Self {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: generate_email(),
            phone: generate_phone(),
        }
    }
}

/// `test_<unix>_<6 lowercase alphanumerics>@example.com`
pub fn generate_email() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!(
        "test_{}_{}@example.com",
        chrono::Utc::now().timestamp(),
        suffix
    )
}

/// French mobile number: `+336` followed by eight digits
pub fn generate_phone() -> String {
    let number: u32 = rand::thread_rng().gen_range(10_000_000..=99_999_999);
    format!("+336{}", number)
}
