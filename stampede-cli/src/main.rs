use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use stampede_alerting::{AlertManager, AlertMonitor, NewAlert};
use stampede_config::{ConfigLoader, LogLevel, StampedeConfig};
use stampede_core::generate_test_id;
use stampede_engine::LoadTestEngine;
use stampede_logging::init_logging;
use stampede_notify::NotificationDispatcher;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod cli;
mod plan;
mod report;

use cli::{Cli, Commands, ConfigCommands, ConfigFormat, OutputFormat};
use plan::TestPlan;
use report::{progress_line, render_text, RunReport};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<StampedeConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

async fn handle_run(
    config: &StampedeConfig,
    plan_path: &Path,
    test_id: Option<String>,
    alert_interval: Duration,
    format: OutputFormat,
) -> Result<()> {
    let plan = TestPlan::from_file(plan_path)?;
    plan.validate()?;

    let test_id = test_id
        .or(plan.test_id.clone())
        .unwrap_or_else(generate_test_id);

    let engine = LoadTestEngine::with_http(&config.http, config.engine.clone())
        .context("Failed to create load test engine")?;
    let dispatcher = Arc::new(
        NotificationDispatcher::from_config(&config.alerting)
            .context("Failed to create notification dispatcher")?,
    );
    let manager = Arc::new(AlertManager::new(config.alerting.clone(), dispatcher.clone())?);

    for alert in &plan.alerts {
        manager
            .create_alert(NewAlert {
                test_id: test_id.clone(),
                ..alert.clone()
            })
            .await
            .with_context(|| format!("Failed to create alert '{}'", alert.name))?;
    }

    engine
        .start_load_test(&test_id, plan.load.clone())
        .await
        .context("Failed to start load test")?;
    info!(test_id = %test_id, url = %plan.load.url, "Load test started");

    let monitor = (!plan.alerts.is_empty()).then(|| {
        AlertMonitor::watch(engine.clone(), manager.clone(), test_id.clone(), alert_interval)
    });

    follow_progress(&engine, &test_id, format).await?;

    let status = engine
        .wait_for_completion(&test_id, Duration::from_millis(50))
        .await?;
    let triggers = match monitor {
        Some(handle) => handle.await.context("Alert monitor stopped unexpectedly")?,
        None => Vec::new(),
    };

    let report = RunReport {
        summary: engine.get_test_summary(&test_id).await.ok(),
        metrics: engine.get_advanced_metrics(&test_id).await?,
        notifications: dispatcher.metrics().get_aggregate_metrics().await,
        status,
        triggers,
    };

    match format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        ),
    }

    if let Some(error) = &report.status.error {
        anyhow::bail!("Load test {} failed: {}", test_id, error);
    }
    Ok(())
}

/// Print progress until the test leaves `running`. Ctrl-C cancels the test.
async fn follow_progress(engine: &LoadTestEngine, test_id: &str, format: OutputFormat) -> Result<()> {
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                warn!(test_id, "Interrupted, cancelling load test");
                if let Err(e) = engine.cancel_test(test_id).await {
                    debug!(test_id, error = %e, "Cancel not applied");
                }
            }
            _ = ticker.tick() => {
                let status = engine.get_test_status(test_id).await?;
                if status.is_terminal() {
                    break;
                }
                if format == OutputFormat::Text {
                    let metrics = engine.get_realtime_metrics(test_id).await.ok();
                    eprint!("\r{}", progress_line(&status, metrics.as_ref()));
                    let _ = std::io::stderr().flush();
                }
            }
        }
    }

    if format == OutputFormat::Text {
        eprintln!();
    }
    Ok(())
}

fn handle_validate(plan_path: &Path) -> Result<()> {
    let plan = TestPlan::from_file(plan_path)?;
    plan.validate()?;

    println!(
        "{} {:?}: {} users against {} for {:?}, {} alert(s)",
        "Plan is valid".green().bold(),
        plan_path,
        plan.load.concurrent_users,
        plan.load.url,
        plan.load.duration,
        plan.alerts.len()
    );
    Ok(())
}

fn handle_config_generate(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let content = StampedeConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", content);
        return Ok(());
    };

    if output.exists() && !force {
        anyhow::bail!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, content).context("Failed to write configuration file")?;

    println!("{} {:?}", "Configuration written to".green(), output);
    Ok(())
}

fn handle_config_show(config: &StampedeConfig, format: ConfigFormat) -> Result<()> {
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to serialize to YAML")?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to serialize to JSON")?
        }
    };
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!("Invalid --log-level: {}", e))?;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Run {
            plan,
            test_id,
            alert_interval,
            format,
        } => handle_run(&config, &plan, test_id, alert_interval, format).await,
        Commands::Validate { plan } => handle_validate(&plan),
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Generate { output, force } => {
                handle_config_generate(output.as_ref(), force)
            }
            ConfigCommands::Show { format } => handle_config_show(&config, format),
        },
    }
}
