use anyhow::{bail, Result};
use asset_locsync::{config, export, reconcile, remote::ParatranzClient, replace};
use std::path::Path;
use tracing::info;

const USAGE: &str = "usage: asset-locsync <update [--update-context] | export <lang> | replace <file>>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in CI)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("asset_locsync=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    // Load configuration from environment
    let mut config = config::Config::from_env()?;
    let client = ParatranzClient::from_config(&config);

    match command.as_str() {
        "update" => {
            if args.iter().skip(1).any(|arg| arg == "--update-context") {
                config.update_context = true;
            }
            let report = reconcile::update_from_assets(&config, &client).await?;
            info!(
                "Update complete: {} created, {} updated, {} deleted",
                report.created, report.updated, report.deleted
            );
        }
        "export" => {
            let Some(language) = args.get(1) else {
                bail!(USAGE);
            };
            export::export_assets(&config, &client, &language.to_lowercase()).await?;
        }
        "replace" => {
            let Some(file) = args.get(1) else {
                bail!(USAGE);
            };
            replace::replace_from_file(&config, &client, Path::new(file)).await?;
        }
        other => bail!("Unknown command {:?}\n{}", other, USAGE),
    }

    Ok(())
}
