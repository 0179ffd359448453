mod cli;

use anyhow::Context;
use clap::Parser;
use log::debug;

use dicom_json_install::install::progress::Reporter;
use dicom_json_install::{InstallError, InstallerConfig, install_on_host};

/// Exit status after Ctrl-C (128 + SIGINT)
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let args = cli::Args::parse();

    let default_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();

    let rt = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            std::process::exit(1);
        }
    };

    let code = rt.block_on(real_main(args));
    // Waits for an in-flight extraction so its staging directory is cleaned up
    drop(rt);
    std::process::exit(code);
}

/// Single-threaded runtime: the pipeline is strictly sequential
fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")
}

async fn real_main(args: cli::Args) -> i32 {
    let reporter = Reporter::new();

    let config = match InstallerConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg.with_overrides(args.overrides()),
        Err(e) => return fail(&reporter, &e),
    };
    debug!("Effective config: {config:?}");

    // Dropping the pipeline future on Ctrl-C drops its scratch directory,
    // which removes any partial download.
    tokio::select! {
        result = install_on_host(&config, args.dry_run, &reporter) => match result {
            Ok(_) => 0,
            Err(e) => fail(&reporter, &e),
        },
        _ = tokio::signal::ctrl_c() => {
            reporter.error("Interrupted, installation aborted");
            EXIT_INTERRUPTED
        }
    }
}

fn fail(reporter: &Reporter, e: &InstallError) -> i32 {
    debug!("{e:?}");
    reporter.error(&e.to_string());
    e.exit_code()
}
