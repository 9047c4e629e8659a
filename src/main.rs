use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use switchboard::config::ScenarioFile;
use switchboard::engine::{AutorunController, AutorunEvent};
use switchboard::providers::{select_provider, ModelRegistry};
use switchboard::{logging, Config, Message, MessageFilter, RunHandle, RunStatus, Simulation};

const DEFAULT_AUTORUN_CAP: u64 = 20;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Tick-driven multi-agent message exchange runtime", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a scenario file without running it
    Validate {
        #[arg(help = "Scenario file (.toml, .yaml or .yml)")]
        scenario: PathBuf,
    },
    /// Run a scenario and print the ledger
    Run {
        #[arg(help = "Scenario file (.toml, .yaml or .yml)")]
        scenario: PathBuf,
        #[arg(long, default_value_t = 10, help = "Manual ticks to issue")]
        ticks: u64,
        #[arg(long, help = "Pace ticks automatically instead")]
        autorun: bool,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        #[arg(long, help = "Request cap, overrides the scenario")]
        max_requests: Option<u64>,
        #[arg(long, help = "Use live model backends unless SWITCHBOARD_SAFE_MODE is on")]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario } => validate(&scenario).await?,
        Commands::Run {
            scenario,
            ticks,
            autorun,
            interval_ms,
            max_requests,
            live,
        } => {
            let run = configure(&scenario, live, max_requests).await?;
            run.start().await?;
            print_messages(&run.list_messages(&MessageFilter::all()).await);

            if autorun {
                run_autorun(&run, Duration::from_millis(interval_ms)).await?;
            } else {
                run_manual(&run, ticks).await;
            }

            if !run.get_status().await.status.is_terminal() {
                run.stop().await?;
            }
            print_summary(&run).await;
        }
    }

    Ok(())
}

async fn validate(path: &Path) -> Result<()> {
    let spec = ScenarioFile::load(path)?.into_run_spec();
    let run = Simulation::configure(
        spec,
        select_provider(true, ModelRegistry::new()),
        Config::default().engine_config(None),
    )?;

    println!("Scenario {} is valid", path.display());
    for agent in &run.agents().await {
        println!(
            "  agent {} ({}, {}, model {})",
            agent.id, agent.display_name, agent.role, agent.model_label
        );
    }
    for link in &run.links().await {
        println!("  link  {} -> {}", link.from, link.to);
    }
    Ok(())
}

async fn configure(path: &Path, live: bool, max_requests: Option<u64>) -> Result<RunHandle> {
    let config = Config::from_env();
    let spec = ScenarioFile::load(path)?.into_run_spec();

    let safe_mode = config.safe_mode || !live;
    if live && config.safe_mode {
        log::warn!("--live ignored: SWITCHBOARD_SAFE_MODE is on");
    }

    let registry = if safe_mode {
        ModelRegistry::new()
    } else {
        ModelRegistry::from_config(&config, spec.agents.iter().map(|a| a.model_label.as_str()))
    };

    let run = Simulation::configure(
        spec,
        select_provider(safe_mode, registry),
        config.engine_config(None),
    )?;
    if max_requests.is_some() {
        run.set_max_requests(max_requests).await;
    }

    println!(
        "Run {} configured ({} mode)",
        run.id(),
        run.provider_kind().as_str()
    );
    Ok(run)
}

async fn run_manual(run: &RunHandle, ticks: u64) {
    for _ in 0..ticks {
        match run.tick().await {
            Ok(result) => {
                print_messages(&result.new_messages);
                if result.status != RunStatus::Running {
                    break;
                }
            }
            Err(e) => {
                eprintln!("Tick failed: {}", e);
                break;
            }
        }
    }
}

async fn run_autorun(run: &RunHandle, period: Duration) -> Result<()> {
    let cap = run
        .get_status()
        .await
        .max_requests
        .unwrap_or(DEFAULT_AUTORUN_CAP);

    let autorun = AutorunController::new(run.clone());
    let mut events = autorun.subscribe();
    autorun.enable(period, cap).await?;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(AutorunEvent::Ticked(result))) => print_messages(&result.new_messages),
                Some(Ok(AutorunEvent::TickFailed { error })) => eprintln!("Tick failed: {}", error),
                Some(Ok(AutorunEvent::Finished(exit))) => {
                    println!("Autorun finished: {:?}", exit);
                    break;
                }
                Some(Err(lagged)) => log::warn!("Autorun events dropped: {}", lagged),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let exit = autorun.disable().await;
                println!("Autorun interrupted: {:?}", exit);
                break;
            }
        }
    }

    Ok(())
}

fn print_messages(messages: &[Message]) {
    for m in messages {
        println!(
            "[t{:>3} #{:>4}] {} -> {} ({}): {}",
            m.tick_index,
            m.sequence_no,
            m.from_agent_id,
            m.to_agent_id,
            m.produced_by.as_str(),
            m.content
        );
    }
}

async fn print_summary(run: &RunHandle) {
    let status = run.get_status().await;
    println!(
        "Run {} {} at tick {}; {} requests{}; last active: {}",
        status.run_id,
        status.status,
        status.current_tick,
        status.request_count,
        status
            .remaining_requests()
            .map(|left| format!(" ({} left)", left))
            .unwrap_or_default(),
        status.active_agent_id.as_deref().unwrap_or("-")
    );
}
