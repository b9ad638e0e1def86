//! SmartX CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use smartx_core::{PluginCatalog, SmartApp};
use smartx_foundation::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SmartX - multi-tenant domain plugin scaffold
#[derive(Parser, Debug)]
#[command(name = "smartx")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: <config_dir>/smartx/smartx.json + ./.smartx/smartx.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Plugins to install at startup (overrides autostart.install)
    #[arg(long, value_delimiter = ',', global = true)]
    install: Vec<String>,

    /// Plugins to enable at startup (overrides autostart.enable)
    #[arg(long, value_delimiter = ',', global = true)]
    enable: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List plugins shipped with this build
    Catalog,
    /// List installed plugins
    List,
    /// Registry statistics
    Stats,
    /// Run health checks on enabled plugins
    Health {
        /// Plugin ID (all enabled plugins if omitted)
        id: Option<String>,
    },
    /// Menu items contributed by enabled plugins
    Menus,
    /// Dashboard widgets contributed by enabled plugins
    Widgets,
    /// UI components contributed by enabled plugins
    Components,
    /// Routes contributed by enabled plugins
    Routes,
    /// Recent lifecycle events from the audit log
    Events {
        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr, so JSON output stays clean)
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if !args.install.is_empty() {
        config.autostart.install = args.install.clone();
    }
    if !args.enable.is_empty() {
        config.autostart.enable = args.enable.clone();
    }

    let app = SmartApp::builder().config(config).build().await?;
    let catalog = PluginCatalog::builtin();
    let report = app.bootstrap(&catalog).await?;
    for id in &report.skipped {
        tracing::warn!(plugin_id = %id, "Skipped unknown or already installed plugin");
    }

    let output = cli::Output::new(args.json);
    let result = match args.command {
        None => cli::summary(&app, &output).await,
        Some(Command::Catalog) => cli::catalog(&app, &catalog, &output).await,
        Some(Command::List) => cli::list(&app, &output).await,
        Some(Command::Stats) => cli::stats(&app, &output).await,
        Some(Command::Health { id }) => cli::health(&app, id.as_deref(), &output).await,
        Some(Command::Menus) => cli::menus(&app, &output).await,
        Some(Command::Widgets) => cli::widgets(&app, &output).await,
        Some(Command::Components) => cli::components(&app, &output).await,
        Some(Command::Routes) => cli::routes(&app, &output).await,
        Some(Command::Events { limit }) => cli::events(&app, limit, &output).await,
    };

    // 명령 실패와 상관없이 정리
    if let Err(e) = app.shutdown().await {
        tracing::warn!(error = %e, "Shutdown finished with errors");
    }

    result
}
