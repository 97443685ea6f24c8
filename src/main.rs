mod cmd;

use appvault::config::ConfigManager;
use appvault::error;
use appvault::graph::auth::ACCESS_TOKEN_ENV;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "appvault",
    about = "Back up and restore Entra ID applications",
    version,
    long_about = "Back up application registrations, service principals and their credentials\n\
                  to a JSON file, and restore them into the same or another tenant."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Tenant to use instead of the active one
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Microsoft Graph access token (skips the tenant token cache)
    #[arg(long, global = true, env = ACCESS_TOKEN_ENV, hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Inspect application registrations in the tenant
    #[command(subcommand)]
    Apps(AppsCommands),

    /// Back up applications to a JSON file
    Backup(cmd::backup::BackupArgs),

    /// Summarize a backup file
    Inspect(cmd::inspect::InspectArgs),

    /// Restore applications from a backup file
    Restore(cmd::restore::RestoreArgs),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List all configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),

    /// Show current configuration
    #[command(name = "show")]
    ShowConfig,
}

#[derive(Subcommand, Debug)]
enum AppsCommands {
    /// List application registrations
    List(cmd::apps::ListArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();
    let config_manager = ConfigManager::new()?;

    init_logging(cli.verbose, &config_manager);

    let ctx = cmd::Context {
        config: config_manager,
        tenant: cli.tenant,
        token: cli.token,
    };

    match cli.command {
        Commands::Tenant(tenant_cmd) => match tenant_cmd {
            TenantCommands::Add(args) => cmd::tenant::add(&ctx, args).await?,
            TenantCommands::List(args) => cmd::tenant::list(&ctx, args).await?,
            TenantCommands::Switch(args) => cmd::tenant::switch(&ctx, args).await?,
            TenantCommands::Remove(args) => cmd::tenant::remove(&ctx, args).await?,
            TenantCommands::ShowConfig => cmd::tenant::show_config(&ctx).await?,
        },
        Commands::Apps(apps_cmd) => match apps_cmd {
            AppsCommands::List(args) => cmd::apps::list(&ctx, args).await?,
        },
        Commands::Backup(args) => cmd::backup::backup(&ctx, args).await?,
        Commands::Inspect(args) => cmd::inspect::inspect(&ctx, args).await?,
        Commands::Restore(args) => cmd::restore::restore(&ctx, args).await?,
    }

    Ok(())
}

/// `--verbose` wins, then `RUST_LOG`, then `log_level` from config.toml
fn init_logging(verbose: bool, config_manager: &ConfigManager) {
    let filter = if verbose {
        EnvFilter::new("appvault=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = config_manager
                .load_config()
                .ok()
                .and_then(|c| c.log_level)
                .unwrap_or_else(|| "warn".to_string());
            EnvFilter::new(format!("appvault={}", level))
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
