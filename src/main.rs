/// Version injected at compile time via RULECTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("RULECTL_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rulectl::api::client::ComplianceClient;
use rulectl::api::http::format_api_error;
use rulectl::codec::AttrMap;
use rulectl::config::Config;
use rulectl::resource::rule::RuleResource;
use rulectl::schema;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage cloud compliance rules declaratively
#[derive(Parser, Debug)]
#[command(name = "rulectl", version = VERSION, about, long_about = None)]
struct Args {
    /// Compliance service instance ID
    #[arg(short, long)]
    instance: Option<String>,

    /// Service endpoint override
    #[arg(long)]
    endpoint: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a rule from a definition file
    Create {
        /// Rule definition (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Fetch a rule and print its state
    Get {
        /// The rule ID
        rule_id: String,
    },
    /// Replace an existing rule with a definition file
    Update {
        /// The rule ID
        rule_id: String,
        /// Rule definition (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a rule
    Delete {
        /// The rule ID
        rule_id: String,
    },
    /// Check a definition file against the rule schema without calling the service
    Validate {
        /// Rule definition (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return None;
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("rulectl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("rulectl").join("rulectl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".rulectl").join("rulectl.log");
    }
    PathBuf::from("rulectl.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(&args).await {
        tracing::error!("Command failed: {:?}", err);
        eprintln!("Error: {}", format_api_error(&err));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    let mut config = Config::load();
    let instance = args
        .instance
        .clone()
        .unwrap_or_else(|| config.effective_instance());
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.effective_endpoint());

    // Validate works offline; everything else needs an instance and a client.
    if let Command::Validate { file } = &args.command {
        return validate_file(file, &instance);
    }

    if instance.is_empty() {
        return Err(anyhow::anyhow!(
            "No instance configured. Set RULECTL_INSTANCE_ID or use --instance"
        ));
    }

    tracing::info!("Using instance: {}, endpoint: {}", instance, endpoint);

    let client = ComplianceClient::new(&endpoint)?;
    let rules = RuleResource::new(&client);

    match &args.command {
        Command::Create { file } => {
            let mut data = load_rule_file(file)?;
            data.insert("instance_id".to_string(), json!(instance));

            rules.create(&mut data).await?;
            print_state(&data);
        }
        Command::Get { rule_id } => {
            let mut data = AttrMap::new();
            data.insert("id".to_string(), json!(format!("{instance}/{rule_id}")));

            rules.read(&mut data).await?;
            if data.contains_key("id") {
                print_state(&data);
            } else {
                println!("Rule {rule_id} not found.");
            }
        }
        Command::Update { rule_id, file } => {
            // Read current state first: it is the dirty-check baseline and
            // carries the etag the replace must present.
            let mut prior = AttrMap::new();
            prior.insert("id".to_string(), json!(format!("{instance}/{rule_id}")));
            rules.read(&mut prior).await?;
            if !prior.contains_key("id") {
                return Err(anyhow::anyhow!("Rule {rule_id} not found"));
            }

            let mut data = load_rule_file(file)?;
            data.insert("instance_id".to_string(), json!(instance));
            data.insert("id".to_string(), json!(format!("{instance}/{rule_id}")));
            if let Some(etag) = prior.get("etag") {
                data.insert("etag".to_string(), etag.clone());
            }

            rules.update(&mut data, &prior).await?;
            print_state(&data);
        }
        Command::Delete { rule_id } => {
            let mut data = AttrMap::new();
            data.insert("id".to_string(), json!(format!("{instance}/{rule_id}")));

            rules.delete(&mut data).await?;
            println!("Rule {rule_id} deleted.");
        }
        Command::Validate { .. } => unreachable!("handled above"),
    }

    // Remember the last-used instance for the next invocation.
    if config.instance_id.as_deref() != Some(instance.as_str()) {
        if let Err(err) = config.set_instance(&instance) {
            tracing::warn!("Failed to persist instance ID: {:?}", err);
        }
    }

    Ok(())
}

/// Load a rule definition file into an attribute map. YAML or JSON, chosen by
/// file extension.
fn load_rule_file(path: &Path) -> Result<AttrMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );

    let value: Value = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {} as YAML", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow::anyhow!(
            "{}: expected a mapping at the top level",
            path.display()
        )),
    }
}

fn validate_file(path: &Path, instance: &str) -> Result<()> {
    let mut data = load_rule_file(path)?;
    if !instance.is_empty() {
        data.entry("instance_id".to_string())
            .or_insert_with(|| json!(instance));
    }

    let problems = schema::validate_map(&schema::rule_schema(), &data);
    if problems.is_empty() {
        println!("{} is valid.", path.display());
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("  {problem}");
        }
        Err(anyhow::anyhow!(
            "{}: {} problem(s) found",
            path.display(),
            problems.len()
        ))
    }
}

fn print_state(data: &AttrMap) {
    if let Some(summary) = format_timestamps(data) {
        println!("{summary}");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(data.clone()))
            .unwrap_or_else(|_| "{}".to_string())
    );
}

/// Render created/updated metadata as a one-line human summary.
fn format_timestamps(data: &AttrMap) -> Option<String> {
    let created_on = data.get("created_on")?.as_str()?;
    let created = chrono::DateTime::parse_from_rfc3339(created_on).ok()?;
    let mut summary = format!("# created {}", created.format("%Y-%m-%d %H:%M UTC"));

    if let Some(created_by) = data.get("created_by").and_then(|v| v.as_str()) {
        summary.push_str(&format!(" by {created_by}"));
    }
    if let Some(updated) = data
        .get("updated_on")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
    {
        summary.push_str(&format!(", updated {}", updated.format("%Y-%m-%d %H:%M UTC")));
    }

    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamps() {
        let data = serde_json::json!({
            "created_on": "2024-03-01T10:30:00Z",
            "created_by": "iam-user",
            "updated_on": "2024-04-02T08:00:00Z"
        });
        let summary = format_timestamps(data.as_object().unwrap()).unwrap();
        assert!(summary.contains("2024-03-01 10:30 UTC"));
        assert!(summary.contains("iam-user"));
        assert!(summary.contains("2024-04-02"));
    }

    #[test]
    fn test_format_timestamps_requires_created_on() {
        let data = serde_json::json!({"description": "d"});
        assert!(format_timestamps(data.as_object().unwrap()).is_none());
    }
}
