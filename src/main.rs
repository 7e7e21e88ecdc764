//! CLI entry point for animedl.

use std::sync::Arc;

use animedl_core::config::{LoadedConfig, VerbositySetting};
use animedl_core::navigator::HttpDriver;
use animedl_core::{
    BrowserDriver, DriverKind, EngineConfig, EpisodeTarget, FileConfig, PatternStore,
    ResolutionEngine, ResolveError, classify, configure_http_policy, load_config,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

mod cli;

use cli::{Args, Command, ResolveArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let config_verbosity = loaded
        .as_ref()
        .ok()
        .and_then(|loaded| loaded.config.verbosity);
    let default_level = if args.quiet {
        "error"
    } else {
        match (args.verbose, config_verbosity) {
            (0, Some(VerbositySetting::Quiet)) => "error",
            (0, Some(VerbositySetting::Verbose)) | (1, _) => "debug",
            (0, Some(VerbositySetting::Debug)) => "trace",
            (0, _) => "info",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let LoadedConfig {
        path,
        config,
        loaded_from_file,
    } = loaded.context("Failed to load configuration")?;
    debug!(?args, ?path, loaded_from_file, "CLI arguments parsed");

    match args.command {
        Command::Classify { urls } => {
            for url in urls {
                println!("{}\t{url}", classify(&url));
            }
            Ok(())
        }
        Command::Patterns { site } => list_patterns(&config, site.as_deref()),
        Command::Resolve(resolve_args) => resolve(&config, &resolve_args).await,
    }
}

fn list_patterns(config: &FileConfig, site: Option<&str>) -> Result<()> {
    let engine_config = EngineConfig::from_file_config(config)?;
    let store = PatternStore::try_load(&engine_config.pattern_store)?;
    let filter = site
        .map(|site| config.site_template(site).map(|template| template.id().clone()))
        .transpose()?;

    let mut shown = 0usize;
    for (site_key, records) in store.sites() {
        if filter.as_ref().is_some_and(|id| id.as_str() != site_key) {
            continue;
        }
        println!("{site_key}");
        for record in records {
            println!(
                "  {:>3}%  ok {:<3} fail {:<3} {}",
                record.confidence, record.successes, record.failures, record.pattern
            );
        }
        shown += 1;
    }
    if shown == 0 {
        info!(store = %engine_config.pattern_store.display(), "No learned patterns");
    }
    Ok(())
}

async fn resolve(config: &FileConfig, args: &ResolveArgs) -> Result<()> {
    let engine_config = EngineConfig::from_file_config(config)?;
    let site = config.site_template(&args.site)?;
    configure_http_policy(
        engine_config.connect_timeout_secs,
        engine_config.read_timeout_secs,
        engine_config.user_agent.clone(),
    );

    let driver = build_driver(engine_config.driver).await?;
    let engine = ResolutionEngine::from_config(&engine_config, driver);
    let target = EpisodeTarget::new(&args.show, &args.episode);
    info!(site = %site.id(), target = %target, "Resolving episode");

    match engine.resolve(&site, &target).await {
        Ok(link) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&link)?);
            } else {
                println!("{}", link.url);
                if let Some(name) = &link.file_name {
                    eprintln!("  file: {name}");
                }
                if let Some(size) = &link.size_hint {
                    eprintln!("  size: {size}");
                }
                eprintln!("  via:  {} ({})", link.host, link.strategy);
            }
            Ok(())
        }
        Err(error) => {
            if let ResolveError::AllCandidatesFailed { failures, .. } = &error {
                for failure in failures {
                    eprintln!("  {failure}: {}", failure.error);
                }
            }
            Err(error).with_context(|| format!("Could not resolve {target}"))
        }
    }
}

async fn build_driver(kind: DriverKind) -> Result<Arc<dyn BrowserDriver>> {
    match kind {
        DriverKind::Http => Ok(Arc::new(HttpDriver::new(None)?)),
        #[cfg(feature = "chromium")]
        DriverKind::Chromium => Ok(Arc::new(
            animedl_core::navigator::ChromiumDriver::launch(None).await?,
        )),
        #[cfg(not(feature = "chromium"))]
        DriverKind::Chromium => {
            anyhow::bail!("driver = \"chromium\" requires building with `--features chromium`")
        }
    }
}
