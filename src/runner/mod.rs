pub mod context;
pub mod events;
pub mod executor;
pub mod state;

use colored::Colorize;
use std::path::PathBuf;

use crate::error::FlowError;
use crate::parser::cases::EdgeCaseSet;
use crate::report::{json, junit, RunReport};
use crate::utils::config::Config;

pub use events::*;
pub use executor::FlowRunner;
pub use state::*;

/// What a finished run produced on disk
pub struct RunOutcome {
    pub report: RunReport,
    pub results_path: PathBuf,
    pub junit_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.report.summary.overall_passed
    }
}

/// Run the registration flow once and write its results file.
///
/// Returns `Err` when the server fails the liveness check, when the edge
/// case file cannot be loaded, or when the report cannot be written.
pub async fn run_flow(config: Config) -> Result<RunOutcome, FlowError> {
    let cases = match &config.cases_file {
        Some(path) => EdgeCaseSet::load(path, config.variant)?,
        None => EdgeCaseSet::builtin(config.variant),
    };

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let output_dir = config.output_dir.clone();
    let prefix = config.variant.results_file_prefix();
    let write_junit = config.junit;

    // The runner owns the emitter; once it returns the listener drains and exits.
    let result = match FlowRunner::new(config, cases, emitter) {
        Ok(runner) => runner.run().await,
        Err(err) => Err(err),
    };
    if let Err(err) = listener.await {
        log::warn!("console listener stopped abnormally: {}", err);
    }
    let report = result?;

    let results_path = json::write_results(&report, &output_dir, prefix)?;
    println!(
        "\n{} Results saved to: {}",
        "📄".to_string().blue(),
        results_path.display()
    );

    let junit_path = if write_junit {
        let path = junit::write_report(&report, &results_path)
            .map_err(|e| FlowError::Report(std::io::Error::other(e.to_string())))?;
        println!("    Generated JUnit report: {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(RunOutcome {
        report,
        results_path,
        junit_path,
    })
}
