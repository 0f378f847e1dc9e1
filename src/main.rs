use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;

use linkcycle::cli::{Cli, Commands, ConfigCommands, JobCommands};
use linkcycle::config::{StaticConfig, get_config, init_config_with};
use linkcycle::errors::LinkError;
use linkcycle::scheduler::{JobRunner, LifecycleJobs, RunnerConfig, spawn_schedule};
use linkcycle::services::TracingNotifier;
use linkcycle::storage::StorageFactory;
use linkcycle::system::init_logging;

/// 退出前等待后台通知送达的最长时间
const NOTIFICATION_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<LinkError>() {
            Some(link_error) => eprintln!("{}", link_error.format_colored()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => generate_config(output_path.as_deref(), force),
        Commands::Jobs { action } => {
            let config = match cli.config.as_deref() {
                Some(path) => StaticConfig::load_from(path),
                None => StaticConfig::load(),
            };
            init_config_with(config);
            run_jobs(action).await
        }
    }
}

async fn run_jobs(action: JobCommands) -> anyhow::Result<()> {
    let config = get_config();
    let _guard = init_logging(&config.logging)?;

    let storage = StorageFactory::create_with(&config.database).await?;
    info!("Using {} storage", storage.backend_name());
    let policy = Arc::new(config.lifecycle.clone());
    let jobs = Arc::new(LifecycleJobs::new(
        storage,
        policy,
        Arc::new(TracingNotifier),
    ));

    match action {
        JobCommands::Run { job } => {
            let runner = JobRunner::new(RunnerConfig::from(&config.scheduler));
            let report = runner.run_job(&jobs, job.into()).await;
            jobs.flush_notifications(NOTIFICATION_FLUSH_TIMEOUT).await;
            println!("{}", report.to_json()?);

            if !report.is_completed() {
                bail!("{} ended with status {}", report.job, report.status);
            }
        }
        JobCommands::Serve => {
            let handles = spawn_schedule(jobs.clone(), &config.scheduler);

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, stopping scheduled jobs");

            for handle in handles {
                handle.abort();
            }
            jobs.flush_notifications(NOTIFICATION_FLUSH_TIMEOUT).await;
        }
    }

    Ok(())
}

fn generate_config(output_path: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = output_path.unwrap_or("config.example.toml");

    if Path::new(path).exists() && !force {
        bail!("{} already exists; use --force to overwrite", path);
    }

    std::fs::write(path, StaticConfig::generate_sample_config())
        .with_context(|| format!("Failed to write {}", path))?;
    println!("Sample configuration written to {}", path);
    Ok(())
}
