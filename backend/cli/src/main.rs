mod terminal_output;
mod world_host;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cmdrelay_channels::{ChannelAdapter, ConsoleAdapter};
use cmdrelay_commands::{
    build_default_dispatcher, builtin_commands, DispatchOptions, Services,
};
use cmdrelay_config::{
    config_dir, config_file_path, load_and_prepare, load_config, validate, ConfigPermissions,
    ConfigSettingsStore, RelayConfig,
};
use cmdrelay_core::{Component, InboundBus, PermissionLevel};

use terminal_output::{note_error, note_success, note_warn, render_table};
use world_host::InMemoryWorldHost;

#[derive(Parser)]
#[command(name = "cmdrelay")]
#[command(about = "cmdrelay: chat command dispatcher")]
#[command(version)]
struct Cli {
    /// Config directory (defaults to $CMDRELAY_CONFIG_DIR or ~/.cmdrelay)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve commands typed on stdin; replies go to stdout
    Serve {
        /// Sender id for plain input lines (`@<id> <text>` overrides per line)
        #[arg(long, default_value = "U-console")]
        sender: String,
    },
    /// List the built-in command catalog
    Commands {
        /// Only show commands usable at this level (none, moderator, owner)
        #[arg(long)]
        level: Option<PermissionLevel>,
    },
    /// Validate the config file
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(config_dir);

    match cli.command {
        Commands::Serve { sender } => serve(&config_dir, sender).await,
        Commands::Commands { level } => {
            list_commands(level);
            Ok(())
        }
        Commands::Check => check(&config_dir).await,
    }
}

fn dispatch_options(config: &RelayConfig) -> DispatchOptions {
    DispatchOptions {
        prefix: config.prefix().to_string(),
        mark_read: config.mark_read(),
        batch_max_chars: config.batch_max_chars(),
        reply_timeout: config.reply_timeout(),
    }
}

async fn serve(config_dir: &Path, sender: String) -> Result<()> {
    let config_path = config_file_path(config_dir);
    let config = load_and_prepare(&config_path)
        .await
        .with_context(|| format!("loading {}", config_path.display()))?;

    cmdrelay_logging::init_logger(config.log_dir(config_dir), config.log_level())?;
    info!(config = %config_path.display(), sender = %sender, "Starting cmdrelay");

    let console = Arc::new(ConsoleAdapter::new(sender.clone()));
    let services = Services {
        messaging: console.clone(),
        permissions: Arc::new(ConfigPermissions::from_config(&config)),
        world: Arc::new(InMemoryWorldHost::demo(&sender)),
        settings: Arc::new(ConfigSettingsStore::new(config.clone(), &config_path)),
    };
    let dispatcher = build_default_dispatcher(services, dispatch_options(&config))
        .context("registering built-in commands")?;

    let mut bus = InboundBus::new();
    let inbound_rx = bus
        .take_inbound_rx()
        .context("inbound receiver already taken")?;
    let dispatcher_task = tokio::spawn(async move {
        if let Err(e) = Component::start(&dispatcher, inbound_rx).await {
            error!(error = %e, "Dispatcher task failed");
        }
    });

    let inbound_tx = bus.inbound_tx.clone();
    drop(bus);

    tokio::select! {
        result = console.start(inbound_tx) => {
            if let Err(e) = result {
                error!(error = %e, "Console channel failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    // Every sender is gone once the console stops, so the loop drains and exits.
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "Dispatcher task panicked");
    }
    info!("cmdrelay stopped");
    Ok(())
}

fn list_commands(level: Option<PermissionLevel>) {
    let rows: Vec<Vec<String>> = builtin_commands()
        .into_iter()
        .filter(|c| level.map_or(true, |l| c.required_permission <= l))
        .map(|c| {
            vec![
                format!("/{}", c.name),
                c.aliases.join(", "),
                c.required_permission.to_string(),
                c.category.to_string(),
                c.usage,
                c.description,
            ]
        })
        .collect();
    print!(
        "{}",
        render_table(
            &["Command", "Aliases", "Permission", "Category", "Usage", "Description"],
            &rows,
        )
    );
}

async fn check(config_dir: &Path) -> Result<()> {
    let path = config_file_path(config_dir);
    let config = load_config(&path).await?;

    let report = validate(&config);
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for err in &report.errors {
        note_error(&format!("{}: {}", err.path, err.message));
    }
    if !report.is_valid() {
        bail!("{} has {} error(s)", path.display(), report.errors.len());
    }
    note_success(&format!("{} is valid", path.display()));
    Ok(())
}
