mod commands;
mod logging;
mod progress;

use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, GlobalOptions};
use dotenv::dotenv;
use export_renamer_core::config::{self, AppConfig};
use export_renamer_core::convert::{CommandConverter, ConversionError, Converter, DisabledConverter};
use export_renamer_core::identity::{IdentityResolver, PgIdentityResolver};
use export_renamer_core::parser::FilenameParser;
use export_renamer_core::{BatchInput, BatchResult, RenameEngine};
use progress::CliReporter;
use tracing::{info, warn};

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let mut config = match args.options.config.as_deref() {
        Some(name) => config::load_configuration_from(name),
        None => config::load_configuration(),
    }
    .context("Error loading configuration")?;
    if let Some(workers) = args.options.workers {
        config.batch.workers = workers.max(1);
    }
    if args.options.no_convert {
        config.conversion.enabled = false;
    }

    match args.command {
        Some(Commands::File { path }) => run_batch(config, &args.options, BatchInput::File(path)),
        Some(Commands::Files { paths }) => {
            let paths = if paths.is_empty() {
                read_paths_from_stdin()?
            } else {
                paths
            };
            run_batch(config, &args.options, BatchInput::Files(paths))
        }
        Some(Commands::Dir { path }) => run_batch(config, &args.options, BatchInput::Directory(path)),
        Some(Commands::Inspect { names }) => run_inspect(&names),
        Some(Commands::CheckDb) => run_check_db(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}

fn run_batch(mut config: AppConfig, options: &GlobalOptions, input: BatchInput) -> Result<()> {
    let resolver = Arc::new(build_resolver(&config)?);
    let converter = build_converter(&mut config);

    let engine = RenameEngine::new(config, resolver, converter).with_dry_run(options.dry_run);
    let cancel = engine.cancel_token();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let reporter = CliReporter::new(options.json);
    let result = engine.run(&input, &reporter)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, options.dry_run);
    }
    Ok(())
}

fn print_summary(result: &BatchResult, dry_run: bool) {
    println!();
    if dry_run {
        println!(
            "{} renames planned, {} unchanged, {} failed",
            format!("{}", result.planned).cyan(),
            format!("{}", result.skipped_unchanged).yellow(),
            format!("{}", result.failed).red(),
        );
    } else {
        println!(
            "{} attempted, {} renamed, {} unchanged, {} failed",
            format!("{}", result.attempted).cyan(),
            format!("{}", result.succeeded).green(),
            format!("{}", result.skipped_unchanged).yellow(),
            format!("{}", result.failed).red(),
        );
    }
    if result.converted > 0 || result.conversion_failed > 0 {
        println!(
            "{} converted, {} conversions failed",
            format!("{}", result.converted).green(),
            format!("{}", result.conversion_failed).red(),
        );
    }
    if result.cancelled {
        println!(
            "{} {} of {} files were not processed",
            "Cancelled:".yellow(),
            result.total - result.attempted,
            result.total
        );
    }
    info!("Batch finished: {}", result);
}

fn run_inspect(names: &[String]) -> Result<()> {
    let parser = FilenameParser::default();
    for name in names {
        let parsed = parser.parse(name);
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    }
    Ok(())
}

fn run_check_db(config: &AppConfig) -> Result<()> {
    let resolver = build_resolver(config)?;
    info!("Checking identity database...");
    resolver
        .health_check()
        .context("Identity database is not reachable")?;
    println!("{} Identity database is reachable", "✓".green());
    Ok(())
}

fn build_resolver(config: &AppConfig) -> Result<PgIdentityResolver> {
    let Some(database_url) = config
        .identity
        .database_url
        .clone()
        .or_else(|| env::var("DATABASE_URL").ok())
    else {
        bail!("No database configured: set identity.database_url or DATABASE_URL");
    };
    let resolver = PgIdentityResolver::new(&config.identity, &database_url)
        .context("Invalid identity configuration")?
        .ensure_capacity(config.batch.workers);
    Ok(resolver)
}

/// Falls back to no conversion, and turns conversion off in `config`, when
/// no engine can be used.
fn build_converter(config: &mut AppConfig) -> Arc<dyn Converter> {
    match CommandConverter::from_config(&config.conversion) {
        Ok(converter) => Arc::new(converter),
        Err(ConversionError::Disabled) => {
            info!("Conversion disabled");
            Arc::new(DisabledConverter)
        }
        Err(err) => {
            warn!("Conversion unavailable, renamed files will not be converted: {}", err);
            config.conversion.enabled = false;
            Arc::new(DisabledConverter)
        }
    }
}

/// One path per line, until EOF or an empty line.
fn read_paths_from_stdin() -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("Error reading file list from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        paths.push(PathBuf::from(line));
    }
    Ok(paths)
}
