//! jsbundle CLI - Command line interface
//!
//! Configuration comes from `jsbundle.json` in the working directory (if
//! present) and command line flags, flags winning.

use clap::Parser;
use jsbundle_config::{LogLevel, SourceLevel, SourceMapMode, Target};
use jsbundle_core::{write_output, BundleError};
use jsbundle_vfs::{NativeFileSystem, VirtualFileSystem};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::info;

mod config;
mod logging;
mod platform;

use crate::config::LogConfig;
use crate::logging::LogFormat;
use crate::platform::print_error;

#[derive(Parser, Debug)]
#[command(
    name = "jsbundle",
    about = "Bundle CommonJS and ES modules into a single script",
    version
)]
struct Cli {
    /// Entry module, relative to the working directory
    #[arg(value_name = "ENTRY")]
    entry: Option<PathBuf>,

    /// Configuration file path (default: ./jsbundle.json when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// ECMAScript level of the sources: es5 | es2015
    #[arg(long, value_name = "LEVEL")]
    source_level: Option<SourceLevel>,

    /// Output folder
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Output file name; without it the bundle is written to stdout
    #[arg(short, long, value_name = "NAME")]
    out_file: Option<String>,

    /// Runtime target: browser | node
    #[arg(long, value_name = "TARGET")]
    target: Option<Target>,

    /// Source maps: off | true | inline
    #[arg(long, value_name = "MODE")]
    source_map: Option<SourceMapMode>,

    /// Replace a specifier before resolution
    #[arg(long, value_name = "FROM=TO")]
    alias: Vec<String>,

    /// Provide a module from a global variable, or stub it with `false`
    #[arg(long, value_name = "NAME=GLOBAL")]
    external: Vec<String>,

    /// Rebuild when a bundled file changes
    #[arg(short, long)]
    watch: bool,

    /// Persist and strictly validate the build cache
    #[arg(long)]
    debug: bool,

    /// silent | error | warn | info | debug | trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Per-phase log level, e.g. `resolver=trace`
    #[arg(long, value_name = "PHASE=LEVEL")]
    log_phase: Vec<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let host = Arc::new(NativeFileSystem::new());

    let config = match config::load(&cli, host.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };
    let log_config = match LogConfig::new(config.log_level).with_overrides(&cli.log_phase) {
        Ok(log_config) => log_config,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };
    logging::init(&log_config, cli.log_format);

    let emit_host: Arc<dyn VirtualFileSystem> = host.clone();
    let watch = config.watch;
    let mut failed = false;
    let result = jsbundle_core::bundle(config.clone(), host, |_session, result| {
        let outcome = result.map_err(BundleError::clone).and_then(|output| {
            write_output(&config, emit_host.clone(), output)?;
            Ok(output)
        });
        match outcome {
            Ok(output) if watch => info!(
                target: "jsbundle::cli",
                modules = output.modules,
                elapsed_ms = output.elapsed.as_millis() as u64,
                "bundle updated"
            ),
            Ok(_) => {}
            Err(e) => {
                print_error(&e, emit_host.as_ref());
                failed = true;
            }
        }
    })
    .await;

    if result.is_err() || failed {
        process::exit(1);
    }
}
