use super::types::RunReport;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Print or save a report as pretty JSON
pub async fn generate(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `<prefix>_<unix>_<run>.json` into `output_dir` and return its path.
///
/// `<run>` is the first eight characters of the run id, so runs started in
/// the same second do not overwrite each other.
pub fn write_results(
    report: &RunReport,
    output_dir: &Path,
    prefix: &str,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let run: String = report.run_id.chars().take(8).collect();
    let path = output_dir.join(format!(
        "{}_{}_{}.json",
        prefix,
        chrono::Utc::now().timestamp(),
        run
    ));
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{RunPhase, RunSummary};
    use crate::utils::config::Variant;

    fn report(run_id: &str) -> RunReport {
        RunReport {
            run_id: run_id.to_string(),
            variant: Variant::Final,
            base_url: "http://localhost:3007".to_string(),
            test_email: "test_1_abcdef@example.com".to_string(),
            test_phone: "+33612345678".to_string(),
            timestamp: "2024-01-01 12:00:00".to_string(),
            phase: RunPhase::Done,
            registration: None,
            placeholder_otp: true,
            session_authenticated: false,
            steps: vec![],
            summary: RunSummary::from_steps(&[], 80),
        }
    }

    #[test]
    fn test_same_second_runs_get_distinct_files() {
        let dir = std::env::temp_dir().join(format!("regflow-json-{}", uuid::Uuid::new_v4()));

        let first = write_results(&report("0f1e2d3c-aaaa"), &dir, "test_results_final").unwrap();
        let second = write_results(&report("9a8b7c6d-bbbb"), &dir, "test_results_final").unwrap();

        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("test_results_final_"));
        assert!(name.ends_with("_0f1e2d3c.json"));
        assert!(first.exists() && second.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
