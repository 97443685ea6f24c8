use super::progress::{self, IndicatifProgress};
use super::Context;
use appvault::backup::collector::EntityGraphCollector;
use appvault::backup::store::BackupStore;
use appvault::error::{AppVaultError, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Output file
    #[arg(short, long)]
    out: PathBuf,

    /// Application (client) ID to back up; repeatable
    #[arg(long = "app-id")]
    app_ids: Vec<String>,

    /// Only applications whose display name starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Back up every application registration in the tenant
    #[arg(long, conflicts_with_all = ["app_ids", "prefix"])]
    all: bool,
}

pub async fn backup(ctx: &Context, args: BackupArgs) -> Result<()> {
    if !args.all && args.app_ids.is_empty() && args.prefix.is_none() {
        return Err(AppVaultError::ConfigError(
            "Select applications with --app-id, --prefix or --all".into(),
        ));
    }

    let directory = ctx.directory()?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let spinner = progress::create_spinner("Selecting applications...");
    let selector = EntityGraphCollector::new(directory.clone());
    let apps = match selector
        .select_applications(args.prefix.as_deref(), &args.app_ids)
        .await
    {
        Ok(apps) => apps,
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Could not list applications");
            return Err(e);
        }
    };
    progress::finish_spinner_success(&spinner, &format!("{} application(s) selected", apps.len()));

    if apps.is_empty() {
        println!("{} Nothing matched; no backup written", "!".yellow());
        return Ok(());
    }

    let bar = progress::create_progress_bar(apps.len() as u64, "Backing up");
    let collector = EntityGraphCollector::new(directory)
        .with_progress(Arc::new(IndicatifProgress::new(bar.clone())))
        .with_cancellation(cancel);
    let report = collector.collect(&apps).await;

    let failures: Vec<(String, String)> = report
        .failures()
        .into_iter()
        .map(|(name, error)| (name.to_string(), error.to_string()))
        .collect();
    let bundles = report.into_bundles();

    if failures.is_empty() {
        progress::finish_progress_success(
            &bar,
            &format!("Backed up {} application(s)", bundles.len()),
        );
    } else {
        progress::finish_progress_warning(
            &bar,
            &format!(
                "Backed up {} of {} application(s)",
                bundles.len(),
                bundles.len() + failures.len()
            ),
        );
    }

    BackupStore::write(&bundles, &args.out)?;

    let without_principal = bundles.iter().filter(|b| !b.has_service_principal()).count();
    let secrets: usize = bundles.iter().map(|b| b.secrets.len()).sum();
    let certificates: usize = bundles.iter().map(|b| b.certificates.len()).sum();

    println!("\n{} Wrote {}", "✓".green(), args.out.display().to_string().bold());
    println!("  Applications:       {}", bundles.len());
    println!("  Secrets:            {}", secrets);
    println!("  Certificates:       {}", certificates);
    if without_principal > 0 {
        println!(
            "  {} {} application(s) have no service principal",
            "!".yellow(),
            without_principal
        );
    }

    if !failures.is_empty() {
        println!("\n{}", "Not backed up:".red().bold());
        for (name, error) in &failures {
            println!("  {} {}: {}", "✗".red(), name, error);
        }
    }

    Ok(())
}

/// Cancel `token` on the first Ctrl-C
pub(crate) fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Cancelling after the applications already in progress...",
                "!".yellow()
            );
            token.cancel();
        }
    });
}
