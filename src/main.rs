use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use regflow_tester::utils::config::{Config, Variant, DEFAULT_BASE_URL, DEFAULT_PASSWORD};
use regflow_tester::{report, runner};

#[derive(Parser)]
#[command(name = "regflow-tester")]
#[command(version)]
#[command(about = "Black-box tester for user registration HTTP flows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registration flow against a live server
    Run {
        /// Server root URL
        #[arg(short, long, env = "REGFLOW_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Scenario variant (final, complete)
        #[arg(long, default_value = "final")]
        variant: Variant,

        /// Real OTP code to verify with (defaults to the 123456 placeholder)
        #[arg(long)]
        otp: Option<String>,

        /// Password for the generated account
        #[arg(long, default_value = DEFAULT_PASSWORD)]
        password: String,

        /// YAML file replacing the built-in edge cases
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Output directory for the results file
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Minimum success rate (percent) for a zero exit code
        #[arg(long, default_value = "80", value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: u8,

        /// Liveness probe timeout in milliseconds
        #[arg(long, default_value = "5000")]
        health_timeout_ms: u64,

        /// Also write a JUnit XML report
        #[arg(long, default_value = "false")]
        junit: bool,
    },

    /// Re-render a saved results file
    Report {
        /// Path to a results JSON file
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "junit")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            base_url,
            variant,
            otp,
            password,
            cases,
            output,
            threshold,
            health_timeout_ms,
            junit,
        } => {
            let config = Config {
                password,
                otp_code: otp,
                variant,
                cases_file: cases,
                health_timeout_ms,
                pass_threshold: threshold,
                output_dir: output,
                junit,
                ..Config::new(&base_url)
            };

            println!(
                "{} Registration flow tester ({} variant)",
                "🧪".to_string().blue(),
                config.variant.as_str().cyan()
            );
            println!("  Server: {}", config.base_url.cyan());
            println!("  Output: {}", config.output_dir.display().to_string().cyan());
            if config.uses_placeholder_otp() {
                println!(
                    "  OTP: {} (placeholder, verification is expected to fail)",
                    config.otp().yellow()
                );
            }

            match runner::run_flow(config).await {
                Ok(outcome) => {
                    let summary = &outcome.report.summary;
                    println!(
                        "{} Global success rate: {}",
                        "📊".to_string().blue(),
                        summary.success_rate.bold()
                    );
                    if outcome.passed() {
                        Ok(ExitCode::SUCCESS)
                    } else {
                        Ok(ExitCode::FAILURE)
                    }
                }
                Err(err) if err.is_fatal() => {
                    eprintln!("{} {}", "✗".red().bold(), err.to_string().red());
                    eprintln!("  Make sure the server is started");
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err.into()),
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
