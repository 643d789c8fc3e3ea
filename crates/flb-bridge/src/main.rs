mod cli;
mod error;
mod host;
mod input;
mod runner;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flb_bridge_core::FlbResult;
use log::{error, info, warn};

use crate::cli::{CliArgs, Commands};
use crate::error::{HarnessError, Result};
use crate::host::PluginLibrary;
use crate::runner::RunOptions;
use crate::settings::Settings;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn info_command(library: PathBuf) -> Result<ExitCode> {
    let plugin = PluginLibrary::load(&library)?;
    let definition = plugin.register()?;

    println!("Library:      {}", plugin.path().display());
    println!("Name:         {}", definition.name);
    println!("Description:  {}", definition.description);
    println!("Type:         {} ({})", definition.type_label(), definition.plugin_type);
    println!("Proxy:        {} ({})", definition.proxy_label(), definition.proxy);
    println!("Entry points: {}", plugin.optional_entry_points().join(", "));
    Ok(ExitCode::SUCCESS)
}

struct RunRequest {
    library: PathBuf,
    input: PathBuf,
    properties: Vec<String>,
    options: RunOptions,
}

fn run_command(request: RunRequest, settings: Settings) -> Result<ExitCode> {
    let mut properties = settings.property_strings();
    for raw in &request.properties {
        let (key, value) = settings::parse_override(raw)?;
        properties.insert(key, value);
    }
    let records = input::read_json_lines(&request.input)?;
    info!("Read {} records from {}", records.len(), request.input.display());

    let plugin = PluginLibrary::load(&request.library)?;
    let definition = plugin.register()?;
    println!("Running output plugin '{}'", definition.name);

    let session = plugin.start(&properties)?;
    let init = session.init_result();
    if !init.is_ok() {
        // The plugin may hold partial state; give it its exit.
        let exit = session.exit();
        info!("Exit after failed init returned {}", exit);
        return Err(HarnessError::Init(init));
    }

    let summary = runner::deliver(&session, &records, &request.options)?;
    let exit = session.exit();
    if exit != FlbResult::Ok {
        warn!("FLBPluginExit returned {}", exit);
    }

    println!(
        "Flushed {} records in {} batches ({} retries)",
        summary.records, summary.batches, summary.retries
    );
    if !summary.is_clean() {
        println!(
            "Dropped {} records in {} batches",
            summary.abandoned_records, summary.abandoned_batches
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn execute(args: CliArgs) -> Result<ExitCode> {
    match args.command {
        Commands::Info { library } => info_command(library),
        Commands::Run {
            library,
            input,
            config,
            properties,
            tag,
            batch_size,
            max_retries,
        } => {
            let settings = match &config {
                Some(path) => {
                    info!("Using settings from {}", path.display());
                    Settings::load(path)?
                }
                None => Settings::default(),
            };
            let defaults = RunOptions::default();
            let options = RunOptions {
                tag: tag.or_else(|| settings.run.tag.clone()).unwrap_or(defaults.tag),
                batch_size: batch_size.or(settings.run.batch_size).unwrap_or(defaults.batch_size),
                max_retries: max_retries.or(settings.run.max_retries).unwrap_or(defaults.max_retries),
            };
            let request = RunRequest {
                library,
                input,
                properties,
                options,
            };
            run_command(request, settings)
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
