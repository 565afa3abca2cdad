mod cli;
mod commands;
mod error_fmt;

use clap::Parser;
use cli::{Cli, Commands, JSON_MODE};
use commands::Ctx;
use eyre::{Result, WrapErr};
use glyco_config::{Config, Logging};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    // Config first so its [logging] section can configure the file layer.
    let cfg = load_config(&cli);
    let guard = match init_tracing(&cli, cfg.as_ref().ok().map(|c| &c.logging)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            None
        }
    };

    if let Err(err) = cfg.and_then(|cfg| run(cli, cfg)) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        let code = error_fmt::exit_code_for_error(&err);
        // `exit` skips destructors; flush the file writer first.
        drop(guard);
        std::process::exit(code);
    }
}

fn run(cli: Cli, cfg: Config) -> Result<()> {
    let ctx = Ctx::new(cfg, cli.json)?;
    match cli.cmd {
        Commands::Forecast { history, now } => commands::cmd_forecast(&ctx, &history, now),
        Commands::Replay { fixture, now } => commands::cmd_replay(&ctx, &fixture, now),
        Commands::Fixture { history, now, out } => {
            commands::cmd_fixture(&ctx, &history, now, &out)
        }
        Commands::Timeline {
            history,
            start,
            end,
            stride_minutes,
        } => commands::cmd_timeline(&ctx, &history, start, end, stride_minutes),
        Commands::Evaluate { history, now } => commands::cmd_evaluate(&ctx, &history, now),
        Commands::SelfCheck => commands::cmd_self_check(&ctx),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let text = std::fs::read_to_string(&cli.config)
        .wrap_err_with(|| format!("read config {:?}", cli.config))?;
    let mut cfg = glyco_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration: parse {:?}: {e}", cli.config))?;
    if let Some(csv) = &cli.basal_csv {
        cfg.schedules.basal = glyco_config::load_schedule_csv(csv)?;
    }
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout carries only command output.
fn init_tracing(cli: &Cli, logging: Option<&Logging>) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid --log-level {:?}", cli.log_level))?;

    let mut guard = None;
    let mut layers = Vec::new();
    if cli.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(logging) = logging
        && let Some(file) = logging.file.as_deref()
    {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "glyco.log".into(), ToOwned::to_owned);
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);
        let level = logging.level.as_deref().unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::try_new(level)?)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(guard)
}
