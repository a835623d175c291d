//! `range` - operator CLI for a cyber-range scenario
//!
//! ```bash
//! range instances
//! range tools victim-1
//! range add-tool victim-1 nmap
//! range uninstall victim-1 nmap --yes
//! range install --timeout-secs 600
//! range scenario show file
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use range_backend::HttpBackend;
use range_core::{
    CancelToken, Confirmation, GraphSnapshot, JobState, LogCursor, NoticeLevel, RangeConfig,
    Session, SessionEvent, UninstallOutcome, ViewState,
};
use range_model::Instance;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "range")]
#[command(version)]
#[command(about = "Cyber-range scenario graph and tool lifecycle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "RANGE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the provisioned instances and print the graph
    Instances,

    /// Print the tools on record for an instance
    Tools {
        /// Instance id or name
        instance: String,
    },

    /// Record a tool as installed on an instance
    AddTool { instance: String, tool: String },

    /// Remove a tool from the record only
    RemoveTool { instance: String, tool: String },

    /// Uninstall a tool from the real instance
    Uninstall {
        instance: String,
        tool: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Run the install job and stream its output
    Install {
        /// Cancel the job after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Saved scenarios
    Scenario {
        #[command(subcommand)]
        action: ScenarioCommand,
    },

    /// List every persisted tool record
    Configs,
}

#[derive(Subcommand)]
enum ScenarioCommand {
    /// Load a saved scenario and print it
    Show {
        #[arg(default_value = "file")]
        name: String,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<RangeConfig> {
    let config = match &cli.config {
        Some(path) => RangeConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RangeConfig::default(),
    };
    let config = config.with_env_overrides();
    let config = match &cli.backend_url {
        Some(url) => config.with_backend_url(url.clone()),
        None => config,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_instance(instance: &Instance) {
    let tools = if instance.tools.is_empty() {
        "-".to_string()
    } else {
        instance.tools.join(",")
    };
    println!(
        "{:<24} {:<20} {:<18} {:<16} {:<10} {}",
        instance.id,
        instance.name,
        instance.role,
        instance.ip(),
        instance.provisioning.status.as_deref().unwrap_or("-"),
        tools
    );
}

fn print_graph(snapshot: &GraphSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    for instance in &snapshot.instances {
        print_instance(instance);
    }
    for edge in &snapshot.edges {
        println!("{}: {} -> {}", edge.id, edge.source, edge.target);
    }
    Ok(())
}

async fn confirm(prompt: &str) -> Result<Confirmation> {
    eprint!("{prompt} [y/N] ");
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await
        .context("reading confirmation")?;
    Ok(match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Confirmation::Confirmed,
        _ => Confirmation::Declined,
    })
}

/// Print notices to stderr as they arrive
fn spawn_notice_printer(session: &Session<HttpBackend>) -> tokio::task::JoinHandle<()> {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::Notice(notice)) if notice.level != NoticeLevel::Info => {
                    eprintln!("{notice}");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn run_install(session: Arc<Session<HttpBackend>>, timeout_secs: Option<u64>) -> Result<()> {
    let cancel = CancelToken::new();
    if let Some(secs) = timeout_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::warn!(secs, "install timed out, cancelling");
            cancel.cancel();
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut rx = session.subscribe();
    let follower = Arc::clone(&session);
    let printer = tokio::spawn(async move {
        let mut cursor = LogCursor::new();
        let print_new = |cursor: &mut LogCursor| {
            for line in cursor.advance(&*follower) {
                println!("{} {}", line.at.format("%H:%M:%S"), line.text);
            }
        };
        loop {
            match rx.recv().await {
                Ok(SessionEvent::InstallLine(_)) => print_new(&mut cursor),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "output printer lagged, reading from the log");
                    print_new(&mut cursor);
                }
                Ok(SessionEvent::JobStateChanged(state)) if state.is_terminal() => {
                    print_new(&mut cursor);
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = session.run_install(&cancel).await?;
    printer.await.context("install output printer")?;

    match &report.state {
        JobState::Completed if report.succeeded() => Ok(()),
        JobState::Completed => bail!(
            "install finished with exit code {}",
            report.exit_code.unwrap_or_default()
        ),
        state => bail!("install {state}"),
    }
}

async fn execute(cli: Cli, session: Arc<Session<HttpBackend>>) -> Result<()> {
    match cli.command {
        Commands::Instances => {
            if session.load_infrastructure().await? == ViewState::NoScenario {
                bail!("no instances available");
            }
            print_graph(&session.snapshot(), cli.json)?;
        }
        Commands::Tools { instance } => {
            session.load_infrastructure().await?;
            let tools = session.select(&instance).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            } else {
                for tool in tools {
                    println!("{tool}");
                }
            }
        }
        Commands::AddTool { instance, tool } => {
            session.load_infrastructure().await?;
            session.add_tool(&instance, &tool).await?;
            println!("{tool} recorded on {instance}");
        }
        Commands::RemoveTool { instance, tool } => {
            session.load_infrastructure().await?;
            session.soft_remove_tool(&instance, &tool).await?;
            println!("{tool} removed from the record of {instance}");
        }
        Commands::Uninstall {
            instance,
            tool,
            yes,
        } => {
            session.load_infrastructure().await?;
            let confirmation = if yes {
                Confirmation::Confirmed
            } else {
                confirm(&format!("Uninstall {tool} from {instance}?")).await?
            };
            match session.uninstall_tool(&instance, &tool, confirmation).await? {
                UninstallOutcome::Removed => println!("{tool} uninstalled from {instance}"),
                UninstallOutcome::Retained { reason } => {
                    bail!("{tool} is still installed on {instance}: {reason}")
                }
                UninstallOutcome::Declined => println!("nothing uninstalled"),
            }
        }
        Commands::Install { timeout_secs } => run_install(session, timeout_secs).await?,
        Commands::Scenario {
            action: ScenarioCommand::Show { name },
        } => {
            if session.load_scenario(&name).await? == ViewState::NoScenario {
                bail!("no scenario named {name}");
            }
            print_graph(&session.snapshot(), cli.json)?;
        }
        Commands::Configs => {
            let listing = session.tool_configs().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&listing.files)?);
            } else {
                for file in &listing.files {
                    println!(
                        "{:<32} {:<20} {}",
                        file.file,
                        file.instance.as_deref().unwrap_or("-"),
                        file.tools.join(",")
                    );
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = load_config(&cli)?;
    tracing::info!(backend = %config.backend.base_url, "starting");

    let backend = HttpBackend::new(config.backend.clone()).context("building HTTP client")?;
    let session = Arc::new(Session::new(Arc::new(backend), config));
    let notices = spawn_notice_printer(&session);

    let outcome = execute(cli, Arc::clone(&session)).await;
    notices.abort();
    outcome
}
