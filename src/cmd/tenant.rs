use super::Context;
use appvault::config::TenantConfig;
use appvault::error::{AppVaultError, Result};
use appvault::graph::auth::REQUIRED_SCOPES;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct TenantAddArgs {
    /// Tenant name
    name: String,

    /// Tenant ID (Entra ID directory ID)
    #[arg(long)]
    tenant_id: String,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,

    /// Make this the active tenant
    #[arg(long)]
    activate: bool,
}

#[derive(Args, Debug)]
pub struct TenantListArgs {
    /// Show detailed information
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
pub struct TenantSwitchArgs {
    /// Tenant name to switch to
    name: String,
}

#[derive(Args, Debug)]
pub struct TenantRemoveArgs {
    /// Tenant name to remove
    name: String,
}

pub async fn add(ctx: &Context, args: TenantAddArgs) -> Result<()> {
    let tenant = TenantConfig {
        name: args.name.clone(),
        tenant_id: args.tenant_id,
        description: args.description,
    };

    ctx.config.add_tenant(tenant)?;
    println!("{} Tenant '{}' added successfully", "✓".green(), args.name);

    if args.activate || ctx.config.load_config()?.current_tenant.is_none() {
        ctx.config.set_active_tenant(&args.name)?;
        println!("{} '{}' is now the active tenant", "→".cyan(), args.name);
    }

    println!(
        "\n{} Place an access token with {} in {} or pass {}",
        "→".cyan(),
        REQUIRED_SCOPES.join(", ").bold(),
        ctx.config.token_cache_file(&args.name).display(),
        "--token".bold()
    );

    Ok(())
}

pub async fn list(ctx: &Context, args: TenantListArgs) -> Result<()> {
    let tenants = ctx.config.load_tenants()?;
    let config = ctx.config.load_config()?;

    if tenants.is_empty() {
        println!("{} No tenants configured", "!".yellow());
        println!(
            "\n{} Run {} to add a tenant",
            "→".cyan(),
            "appvault tenant add".bold()
        );
        return Ok(());
    }

    println!("\n{}", "Configured Tenants:".bold());
    println!("{}", "─".repeat(60));

    for tenant in &tenants {
        let is_current = config.current_tenant.as_ref() == Some(&tenant.name);
        let marker = if is_current {
            "●".green()
        } else {
            "○".dimmed()
        };

        println!("\n{} {}", marker, tenant.name.bold());

        if args.verbose {
            println!("  Tenant ID:    {}", tenant.tenant_id);

            if let Some(desc) = &tenant.description {
                println!("  Description:  {}", desc);
            }

            match ctx.config.load_token(&tenant.name) {
                Ok(token) => {
                    println!(
                        "  Token:        {} (expires: {})",
                        "Cached".green(),
                        token.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                Err(AppVaultError::TokenExpired(_)) => {
                    println!("  Token:        {}", "Expired".red());
                }
                Err(_) => {
                    println!("  Token:        {}", "None".yellow());
                }
            }
        }
    }

    println!("\n{}", "─".repeat(60));
    println!("{} {} tenant(s) total", "→".cyan(), tenants.len());

    if let Some(current) = &config.current_tenant {
        println!("{} Active: {}", "→".cyan(), current.bold());
    }

    Ok(())
}

pub async fn switch(ctx: &Context, args: TenantSwitchArgs) -> Result<()> {
    ctx.config.set_active_tenant(&args.name)?;
    println!("{} Switched to tenant '{}'", "✓".green(), args.name);
    Ok(())
}

pub async fn remove(ctx: &Context, args: TenantRemoveArgs) -> Result<()> {
    ctx.config.remove_tenant(&args.name)?;
    println!("{} Tenant '{}' removed", "✓".green(), args.name);
    Ok(())
}

pub async fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.settings()?;

    println!("\n{}", "Configuration:".bold());
    println!("{}", "─".repeat(60));
    println!("  Directory:          {}", ctx.config.config_dir().display());
    println!(
        "  Active tenant:      {}",
        config.current_tenant.as_deref().unwrap_or("(none)")
    );
    if let Some(tenant) = &ctx.tenant {
        println!("  Tenant override:    {}", tenant);
    }

    println!("\n{}", "Graph:".bold());
    println!("  Base URL:           {}", config.graph.base_url);
    println!("  Page size:          {}", config.graph.page_size);
    println!("  Max retries:        {}", config.graph.max_retries);
    println!(
        "  Backoff:            {}ms .. {}ms",
        config.graph.initial_backoff_ms, config.graph.max_backoff_ms
    );
    println!("  Timeout:            {}s", config.graph.timeout_secs);

    println!("\n{}", "Restore:".bold());
    println!(
        "  Propagation delay:  {}s",
        config.restore.propagation_delay_secs
    );
    println!("  Workers:            {}", config.restore.workers);

    Ok(())
}
