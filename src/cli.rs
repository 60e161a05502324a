use crate::analysis::StaticAnalyzer;
use crate::config::types::{Language, SecurityConfig};
use crate::core::judge::Judge;
use crate::core::types::TestCase;
use crate::exec::executor::SANDBOX_PATH;
use crate::observability::audit::AuditLog;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Screen and judge untrusted code submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a submission against a JSON list of test cases
    Execute {
        /// Submission language (python, javascript, java, cpp, c)
        #[arg(long)]
        language: String,
        /// File holding the submission source
        #[arg(long)]
        code: PathBuf,
        /// JSON file: [{"input": ..., "expected_output": "..."}]
        #[arg(long)]
        tests: PathBuf,
        /// Configuration file (defaults to ./judge.json, then built-in defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Time limit in seconds
        #[arg(long)]
        time: Option<f64>,
        /// Memory limit in MB
        #[arg(long)]
        mem: Option<u64>,
        /// Append audit events as JSON lines to this file
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },
    /// Run only the static screening and print violations
    Scan {
        #[arg(long)]
        language: String,
        #[arg(long)]
        code: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check that the configured Python interpreter is usable
    CheckDeps {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as JSON
    DefaultConfig,
}

fn load_config(path: Option<&Path>) -> Result<SecurityConfig> {
    match path {
        Some(path) => SecurityConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(SecurityConfig::load_default()),
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Execute {
            language,
            code,
            tests,
            config,
            time,
            mem,
            audit_log,
        } => {
            let config = load_config(config.as_deref())?.with_overrides(time, mem);
            let source = read_source(&code)?;
            let cases: Vec<TestCase> = serde_json::from_str(&read_source(&tests)?)
                .with_context(|| format!("Invalid test case file {}", tests.display()))?;

            let mut judge = Judge::new(config)?;
            if let Some(path) = audit_log {
                judge = judge.with_audit(AuditLog::to_file(path)?);
            }

            let verdict = judge.execute(&language, &source, &cases);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            if !verdict.is_pass() {
                std::process::exit(1);
            }
        }
        Commands::Scan {
            language,
            code,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let language: Language = language.parse()?;
            let violations = StaticAnalyzer::new(&config).scan(&read_source(&code)?, language);
            println!("{}", serde_json::to_string_pretty(&violations)?);
            if !violations.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::CheckDeps { config } => {
            let config = load_config(config.as_deref())?;
            if !check_python(&config.python_executable) {
                std::process::exit(1);
            }
        }
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&SecurityConfig::default())?);
        }
    }
    Ok(())
}

/// Run `python --version` on the sandbox search path.
fn check_python(executable: &Path) -> bool {
    let output = std::process::Command::new(executable)
        .arg("--version")
        .env_clear()
        .env("PATH", SANDBOX_PATH)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let version = if output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stderr)
            } else {
                String::from_utf8_lossy(&output.stdout)
            };
            println!(
                "Python: OK ({} -> {})",
                executable.display(),
                version.lines().next().unwrap_or("").trim()
            );
            true
        }
        Ok(output) => {
            println!("Python: FAILED ({} exited with {})", executable.display(), output.status);
            false
        }
        Err(e) => {
            println!("Python: NOT FOUND ({}: {})", executable.display(), e);
            false
        }
    }
}
