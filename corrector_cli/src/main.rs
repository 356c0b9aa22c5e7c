mod cli;
mod error_fmt;
mod logging;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use corrector_config::{BindingRow, Config, load_binding_csv};
use corrector_core::conversions::linear_model;
use corrector_core::error::CorrectorError;
use eyre::Result;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{RunOverrides, named_sim_options, resolve_binding, resolve_outputs, run_corrector};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CorrectorError::Config(format!("read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&text)
        .map_err(|e| CorrectorError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| CorrectorError::Config(e.to_string()))?;
    Ok(cfg)
}

fn load_binding(path: Option<&Path>) -> Result<Option<Vec<BindingRow>>> {
    path.map(|p| load_binding_csv(p).map_err(|e| eyre::Report::from(CorrectorError::Config(e.to_string()))))
        .transpose()
}

fn setup(cli: &Cli) -> Result<(Config, Option<Vec<BindingRow>>)> {
    let cfg = load_config(&cli.config)?;
    let rows = load_binding(cli.binding.as_deref())?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");
    Ok((cfg, rows))
}

fn check_config(cli: &Cli) -> Result<()> {
    let (cfg, rows) = setup(cli)?;
    let table = corrector_sim::node_table(&named_sim_options(&cfg));
    let binding = resolve_binding(&cfg, rows.as_deref(), &table)?;
    resolve_outputs(&cfg, rows.as_deref(), &table)?;
    if let Some(model) = &cfg.model {
        linear_model(model, &cfg.features.inputs)?;
    }
    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "inputs": cfg.features.inputs.len(),
                "bound_nodes": binding.len(),
                "model": cfg.model.is_some(),
            })
        );
    } else {
        println!("config ok");
    }
    Ok(())
}

fn run(cli: &Cli, overrides: RunOverrides) -> Result<()> {
    let (cfg, rows) = setup(cli)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
    let summary = run_corrector(&cfg, rows.as_deref(), overrides, shutdown)?;
    if cli.json {
        println!("{}", summary.to_json());
    } else {
        println!("{}", summary.to_line());
    }
    Ok(())
}

fn real_main(cli: Cli) -> Result<()> {
    match cli.cmd {
        Commands::Health => {
            println!("ok");
            Ok(())
        }
        Commands::CheckConfig => check_config(&cli),
        Commands::Run {
            cycles,
            trace_notifications,
        } => run(
            &cli,
            RunOverrides {
                cycles,
                trace_notifications,
            },
        ),
    }
}
