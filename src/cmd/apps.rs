use super::progress;
use super::Context;
use appvault::backup::collector::EntityGraphCollector;
use appvault::error::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only applications whose display name starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let directory = ctx.directory()?;
    let collector = EntityGraphCollector::new(directory);

    let spinner = progress::create_spinner("Listing application registrations...");
    let apps = match collector.select_applications(args.prefix.as_deref(), &[]).await {
        Ok(apps) => {
            progress::finish_spinner_success(
                &spinner,
                &format!("Found {} application(s)", apps.len()),
            );
            apps
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Listing failed");
            return Err(e);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&apps)?);
        return Ok(());
    }

    if apps.is_empty() {
        println!("{} No application registrations found", "!".yellow());
        return Ok(());
    }

    println!("\n{:<40} {:<38} {}", "Name".bold(), "App ID".bold(), "Audience".bold());
    println!("{}", "─".repeat(100));
    for app in &apps {
        println!(
            "{:<40} {:<38} {}",
            app.display_name,
            app.app_id().dimmed(),
            app.sign_in_audience.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
