use anyhow::Context;
use clap::Parser;
use clawstack_core::Layout;
use clawstack_provision::{DeployOptions, LocalHost};
use clawstack_ui::TermPrompter;
use console::style;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Every choice is made through prompts; there are no deploy flags.
#[derive(Parser)]
#[command(
    name = "clawstack",
    version,
    about = "Install the OpenClaw gateway behind the clawstack security proxy on this host"
)]
struct Cli {}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clawstack=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn layout_from_env() -> anyhow::Result<Layout> {
    let bundle_dir = match std::env::var_os("CLAWSTACK_BUNDLE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };
    let repo = std::env::var("OPENCLAW_REPO_URL")
        .unwrap_or_else(|_| clawstack_core::config::DEFAULT_GATEWAY_REPO.to_string());
    Ok(Layout::system(bundle_dir, repo))
}

async fn deploy() -> anyhow::Result<()> {
    let opts = DeployOptions::new(layout_from_env()?);
    clawstack_provision::run(&LocalHost, &TermPrompter, &opts).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let _cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = deploy().await {
        error!(error = %format!("{e:#}"), "deployment aborted");
        eprintln!("\n{}", style("Deployment aborted").red().bold());
        eprintln!("{e:#}");
        eprintln!(
            "\nFix the problem above and run clawstack again; completed steps are safe to repeat."
        );
        std::process::exit(1);
    }
}
