use super::state::RunSummary;
use tokio::sync::broadcast;

/// Flow execution events for the live transcript
#[derive(Debug, Clone)]
pub enum FlowEvent {
    // Run events
    RunStarted {
        run_id: String,
        base_url: String,
        email: String,
    },
    RunFinished {
        summary: RunSummary,
        threshold: u8,
    },

    // Step events
    StepStarted {
        index: usize,
        name: String,
    },
    StepPassed {
        index: usize,
        name: String,
        status_code: Option<u16>,
        duration_ms: u64,
    },
    StepFailed {
        index: usize,
        name: String,
        error: String,
        status_code: Option<u16>,
        duration_ms: u64,
    },
    StepSkipped {
        index: usize,
        name: String,
        reason: String,
    },

    // Edge case probes
    ProbeFinished {
        case: String,
        success: bool,
        detail: String,
    },

    Log {
        message: String,
    },
    Warning {
        message: String,
    },
}

/// Event emitter for broadcasting flow events
pub struct EventEmitter {
    sender: broadcast::Sender<FlowEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<FlowEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: FlowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(FlowEvent::Log {
            message: message.into(),
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(FlowEvent::Warning {
            message: message.into(),
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

/// Prints a timestamped transcript of the run to stdout
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    /// Runs until every sender is dropped and the channel is drained
    pub async fn listen(mut receiver: broadcast::Receiver<FlowEvent>) {
        use colored::Colorize;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("console transcript dropped {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let ts = chrono::Local::now().format("%H:%M:%S").to_string().dimmed();

            match event {
                FlowEvent::RunStarted {
                    run_id,
                    base_url,
                    email,
                } => {
                    println!("{}", "=".repeat(60));
                    println!(
                        "[{}] {} Registration flow run {}",
                        ts,
                        "▶".green().bold(),
                        run_id.cyan()
                    );
                    println!("  Server: {}", base_url.cyan());
                    println!("  Test email: {}", email.cyan());
                    println!("{}", "=".repeat(60));
                }

                FlowEvent::StepStarted { index, name } => {
                    println!(
                        "\n[{}] {} Step {}: {}",
                        ts,
                        "→".blue(),
                        index,
                        name.white().bold()
                    );
                }

                FlowEvent::StepPassed {
                    index,
                    name,
                    status_code,
                    duration_ms,
                } => {
                    println!(
                        "[{}]   {} [{}] {} ({})",
                        ts,
                        "✓".green(),
                        index,
                        name,
                        step_timing(status_code, duration_ms)
                    );
                }

                FlowEvent::StepFailed {
                    index,
                    name,
                    error,
                    status_code,
                    duration_ms,
                } => {
                    println!(
                        "[{}]   {} [{}] {} ({})",
                        ts,
                        "✗".red(),
                        index,
                        name,
                        step_timing(status_code, duration_ms)
                    );
                    println!("          {}", error.red());
                }

                FlowEvent::StepSkipped {
                    index,
                    name,
                    reason,
                } => {
                    println!(
                        "\n[{}]   {} [{}] {} ({})",
                        ts,
                        "○".yellow(),
                        index,
                        name,
                        reason.dimmed()
                    );
                }

                FlowEvent::ProbeFinished {
                    case,
                    success,
                    detail,
                } => {
                    let icon = if success { "✓".green() } else { "✗".red() };
                    println!("[{}]     {} {}: {}", ts, icon, case, detail.dimmed());
                }

                FlowEvent::Log { message } => {
                    println!("[{}]     {}", ts, message);
                }

                FlowEvent::Warning { message } => {
                    println!("[{}]     {} {}", ts, "⚠".yellow(), message.yellow());
                }

                FlowEvent::RunFinished { summary, threshold } => {
                    println!("\n{}", "=".repeat(60));
                    println!("{} Run summary", "■".blue().bold());
                    println!("{}", "=".repeat(60));
                    println!(
                        "  Steps: {} passed / {} run ({} skipped)",
                        summary.successful_steps.to_string().green(),
                        summary.total_steps,
                        summary.skipped_steps.to_string().yellow()
                    );
                    println!(
                        "  Edge cases: {}/{} ({})",
                        summary.edge_cases_success,
                        summary.edge_cases_total,
                        summary.edge_cases_rate
                    );
                    println!("  Success rate: {}", summary.success_rate.bold());
                    if let Some(duration) = summary.duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                    if summary.overall_passed {
                        println!("  {}", "OVERALL: PASSED".green().bold());
                    } else {
                        println!(
                            "  {} (below {}%)",
                            "OVERALL: FAILED".red().bold(),
                            threshold
                        );
                    }
                }
            }
        }
    }
}

/// `HTTP 201, 12ms`, or just `12ms` when no response was received
fn step_timing(status_code: Option<u16>, duration_ms: u64) -> String {
    match status_code {
        Some(code) => format!("HTTP {}, {}ms", code, duration_ms),
        None => format!("{}ms", duration_ms),
    }
}
