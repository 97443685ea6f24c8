use super::backup::spawn_ctrl_c;
use super::progress::{self, IndicatifProgress};
use super::Context;
use appvault::backup::store::BackupStore;
use appvault::error::{AppVaultError, Result};
use appvault::restore::{
    BundleStatus, IssuedSecret, RestoreOptions, RestoreOrchestrator, RestoreReport,
};
use appvault::resolver::DirectoryNameResolver;
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup file to restore from
    #[arg(short, long)]
    input: PathBuf,

    /// Applications restored concurrently (default from config.toml)
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds to wait between registration and service principal create
    #[arg(long)]
    propagation_delay_secs: Option<u64>,

    /// Skip applications whose display name already exists in the tenant
    #[arg(long)]
    skip_existing: bool,

    /// Show what would be restored without making changes
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Write newly issued client secrets to this file
    #[arg(long)]
    secrets_out: Option<PathBuf>,
}

pub async fn restore(ctx: &Context, args: RestoreArgs) -> Result<()> {
    let bundles = BackupStore::read(&args.input)?;
    if bundles.is_empty() {
        return Err(AppVaultError::NothingToRestore);
    }
    let settings = ctx.settings()?;

    let mut options = RestoreOptions::from(&settings.restore);
    if let Some(workers) = args.workers {
        options.workers = workers.max(1);
    }
    if let Some(secs) = args.propagation_delay_secs {
        options.propagation_delay = Duration::from_secs(secs);
    }
    options.skip_existing = args.skip_existing;

    let secrets: usize = bundles.iter().map(|b| b.secrets.len()).sum();
    let certificates: usize = bundles.iter().map(|b| b.certificates.len()).sum();
    println!(
        "{} {} application(s), {} secret(s), {} certificate(s) in {}",
        "→".cyan(),
        bundles.len(),
        secrets,
        certificates,
        args.input.display()
    );

    if args.dry_run {
        println!("\n{}", "Dry run, nothing will be created:".yellow().bold());
        for bundle in &bundles {
            let principal = if bundle.has_service_principal() {
                "service principal"
            } else {
                "default service principal"
            };
            println!(
                "  {} {} (+ {}, {} secret(s), {} certificate(s))",
                "○".dimmed(),
                bundle.display_name(),
                principal,
                bundle.secrets.len(),
                bundle.certificates.len()
            );
        }
        return Ok(());
    }

    if secrets > 0 && args.secrets_out.is_none() {
        println!(
            "{} New secrets will be issued but not saved; pass {} to keep them",
            "!".yellow(),
            "--secrets-out".bold()
        );
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Restore {} application(s)?", bundles.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let directory = ctx.directory()?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let bar = progress::create_progress_bar(bundles.len() as u64, "Restoring");
    let orchestrator = RestoreOrchestrator::new(directory.clone(), options)
        .with_resolver(Arc::new(DirectoryNameResolver::new(directory)))
        .with_progress(Arc::new(IndicatifProgress::new(bar.clone())))
        .with_cancellation(cancel);

    let report = orchestrator.restore(bundles).await?;

    if report.is_clean() {
        progress::finish_progress_success(
            &bar,
            &format!("Restored {} application(s)", report.succeeded),
        );
    } else {
        progress::finish_progress_warning(&bar, "Restore finished with problems");
    }

    if let Some(path) = &args.secrets_out {
        let issued = report.issued_secrets();
        write_secrets(path, &issued)?;
        println!(
            "{} {} new secret(s) written to {}",
            "✓".green(),
            issued.len(),
            path.display()
        );
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &RestoreReport) {
    println!("\n{}", "Restore Summary:".bold());
    println!("{}", "─".repeat(60));

    for outcome in &report.outcomes {
        let marker = match outcome.status {
            BundleStatus::Succeeded => "✓".green(),
            BundleStatus::Partial => "◐".yellow(),
            BundleStatus::Failed => "✗".red(),
            BundleStatus::Skipped | BundleStatus::Cancelled => "○".dimmed(),
        };
        let new_id = outcome.new_app_id.as_deref().unwrap_or("-");
        println!(
            "{} {:<40} {:<10} {}",
            marker,
            outcome.display_name,
            outcome.status.to_string(),
            new_id.dimmed()
        );
        for note in &outcome.notes {
            println!("    {}", note.dimmed());
        }
    }

    println!("\n  Succeeded:  {}", report.succeeded.to_string().green());
    println!("  Partial:    {}", report.partial.to_string().yellow());
    println!("  Failed:     {}", report.failed.to_string().red());
    if report.skipped > 0 {
        println!("  Skipped:    {}", report.skipped);
    }
    if report.cancelled > 0 {
        println!("  Cancelled:  {}", report.cancelled);
    }

    if !report.errors.is_empty() {
        println!("\n{}", "Errors:".red().bold());
        for error in &report.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }
}

fn write_secrets(path: &Path, secrets: &[&IssuedSecret]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(serde_json::to_string_pretty(secrets)?.as_bytes())?;
    Ok(())
}
