use super::Context;
use appvault::backup::store::BackupStore;
use appvault::backup::BackupBundle;
use appvault::error::Result;
use appvault::graph::directory::ObjectKind;
use appvault::resolver::DirectoryNameResolver;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Backup file to read
    #[arg(short, long)]
    input: PathBuf,

    /// Look up display names of resource APIs and owners in the tenant
    #[arg(long)]
    resolve_names: bool,
}

pub async fn inspect(ctx: &Context, args: InspectArgs) -> Result<()> {
    let bundles = BackupStore::read(&args.input)?;

    let resolver = if args.resolve_names {
        let directory = ctx.directory()?;
        Some(DirectoryNameResolver::new(directory))
    } else {
        None
    };

    println!(
        "\n{} {} ({} application(s))",
        "Backup:".bold(),
        args.input.display(),
        bundles.len()
    );
    println!("{}", "─".repeat(60));

    for bundle in &bundles {
        print_bundle(bundle, resolver.as_ref()).await;
    }

    if let Some(resolver) = &resolver {
        println!(
            "\n{} {} directory lookup(s)",
            "→".cyan(),
            resolver.lookups()
        );
    }

    Ok(())
}

async fn print_bundle(bundle: &BackupBundle, resolver: Option<&DirectoryNameResolver>) {
    let app = &bundle.application;
    println!("\n{} {}", "●".green(), app.display_name.bold());
    println!("  App ID:             {}", app.app_id());
    println!(
        "  Captured:           {}",
        bundle.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    match &bundle.service_principal {
        Some(sp) => println!(
            "  Service principal:  {}",
            sp.id.as_deref().unwrap_or("(no id)")
        ),
        None => println!("  Service principal:  {}", "none".yellow()),
    }
    println!("  Secrets:            {}", bundle.secrets.len());
    println!("  Certificates:       {}", bundle.certificates.len());
    if let Some(job) = &bundle.synchronization_job {
        println!(
            "  Provisioning:       {}",
            job.template_id.as_deref().unwrap_or("configured")
        );
    }

    if !app.required_resource_access.is_empty() {
        println!("  API permissions:");
        for access in &app.required_resource_access {
            let name = match resolver {
                Some(r) => r.resolve(ObjectKind::Application, &access.resource_app_id).await,
                None => access.resource_app_id.clone(),
            };
            println!(
                "    - {} ({} permission(s))",
                name,
                access.resource_access.len()
            );
        }
    }

    if !bundle.owners.is_empty() {
        println!("  Owners:");
        for owner in &bundle.owners {
            let kind = owner
                .odata_type
                .as_deref()
                .and_then(ObjectKind::from_odata_type);
            let name = match (resolver, kind) {
                (Some(r), Some(ObjectKind::Application)) => match &owner.app_id {
                    Some(app_id) => r.resolve(ObjectKind::Application, app_id).await,
                    None => owner.id.clone(),
                },
                (Some(r), Some(kind)) => r.resolve(kind, &owner.id).await,
                _ => owner.id.clone(),
            };
            println!("    - {}", name);
        }
    }
}

