#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `winder`: replay recorded winder traces through the estimators.

mod cli;
mod error_fmt;
mod replay;

use clap::Parser;
use eyre::WrapErr;
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::replay::{ReplayOpts, build_estimators, run_replay};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => winder_config::Config::default(),
    };
    cfg.validate()?;
    init_tracing(&cli, &cfg.logging)?;

    match cli.cmd {
        Commands::CheckConfig => {
            // Constructors re-check the mapped runtime configs
            build_estimators(&cfg, true)?;
            let rendered = if cli.json {
                serde_json::to_string(&cfg).wrap_err("render config")?
            } else {
                toml::to_string_pretty(&cfg).wrap_err("render config")?
            };
            if !cli.json {
                println!("# config OK");
            }
            println!("{rendered}");
            Ok(())
        }
        Commands::Replay {
            trace,
            summary,
            every,
            friction,
        } => {
            let rows = winder_config::load_trace_csv(&trace)?;
            tracing::info!(rows = rows.len(), trace = %trace.display(), "replay start");
            let mut est = build_estimators(&cfg, friction)?;
            let opts = ReplayOpts {
                json: cli.json,
                summary,
                every,
            };
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let s = run_replay(&mut est, &rows, cfg.inertia.dt, opts, &mut out)?;
            tracing::info!(
                cycles = s.cycles,
                state = %s.last.inertia.state,
                j_total = s.last.inertia.j_total,
                "replay complete"
            );
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> eyre::Result<winder_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    winder_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))
}

/// Console logs go to stderr so stdout stays a clean record stream. An
/// optional JSON file sink comes from `[logging]`.
fn init_tracing(cli: &Cli, logging: &winder_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid --log-level {:?}", cli.log_level))?;

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging
                .level
                .as_deref()
                .unwrap_or("info")
                .parse::<LevelFilter>()
                .wrap_err("logging.level must be a tracing level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(level),
            )
        }
        None => None,
    };

    // Ignore error if a subscriber was already set
    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
    Ok(())
}
