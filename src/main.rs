mod cli;
mod host;
mod message;
mod util;
mod plugins;
mod pipeline;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    let opts = cli::get_opts();
    match (opts.subcommand.as_str(), opts.path.as_deref()) {
        ("run", Some(path)) => {
            let summary = pipeline::run_pipeline(std::path::Path::new(path))
                .await
                .context("pipeline run failed")?;
            println!(
                "Completed {} tick(s), {} failed; artifacts in {}",
                summary.ticks_completed,
                summary.ticks_failed,
                summary.run_dir.display()
            );
        }
        ("validate", Some(path)) => {
            pipeline::validate_pipeline_file(std::path::Path::new(path))?;
        }
        ("plugins", _) => list_plugins()?,
        (other, _) => {
            eprintln!("Unknown subcommand: {} (supported: run, validate, plugins)", other);
            cli::usage();
        }
    }

    Ok(())
}

fn list_plugins() -> anyhow::Result<()> {
    for name in plugins::BUILTIN_NAMES {
        println!("{}", plugins::describe_builtin(name)?);
    }
    Ok(())
}
