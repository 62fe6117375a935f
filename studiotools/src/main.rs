use anyhow::{Context, Result};
use clap::Parser;
use studiotools::cli::{Cli, Commands};
use studiotools::{commands, AppContext};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cwd = match cli.cwd.clone() {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    let cx = AppContext::new(cwd).await;
    debug!("Running in {} (project: {:?})", cx.context.cwd.display(), cx.context.project.name);

    match cli.command {
        Commands::Context => commands::handle_context(&cx).await?,
        Commands::Ls(args) => commands::handle_ls(args, &cx).await?,
        Commands::Tree(args) => commands::handle_tree(args, &cx).await?,
        Commands::Assets(args) => commands::handle_assets(args, &cx).await?,
        Commands::Files(args) => commands::handle_files(args, &cx).await?,
        Commands::Publish(args) => commands::handle_publish(args, &cx).await?,
        Commands::Create(args) => commands::handle_create(args, &cx).await?,
        Commands::NewFile(args) => commands::handle_new_file(args, &cx).await?,
        Commands::Delete(args) => commands::handle_delete(args, &cx).await?,
        Commands::NextVersion(args) => commands::handle_next_version(args, &cx).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q` means errors only and each `-v` raises the level
/// one step from `warn`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
