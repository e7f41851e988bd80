//! GPIO Keypad Daemon - maps GPIO-wired buttons to virtual keyboard input.
//!
//! Buttons connect between a GPIO pin and ground; internal pull-ups are
//! enabled, levels are debounced, and every press/release/repeat appears on
//! an ordinary virtual keyboard device that emulators and front-ends read
//! like any other keyboard. The pin mapping lives in a directive file that
//! can be edited, replaced or deleted while the daemon runs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use gpiokeyd::config;
use gpiokeyd::constants::{APP_BINARY_NAME, APP_NAME};
use gpiokeyd::engine::Daemon;

/// GPIO Keypad Daemon - maps buttons wired to GPIO pins to keyboard events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pin mapping file: a full path, or a bare name resolved against /boot
    /// (default: /boot/gpiokeyd.cfg)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let paths = config::resolve(cli.config.as_deref());
    info!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    info!("config file: {}", paths.path.display());

    match Daemon::new(paths).and_then(|mut daemon| daemon.run()) {
        Ok(()) => {
            println!("Done.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{APP_BINARY_NAME}: {err:#}.  Try 'sudo {APP_BINARY_NAME}'.");
            ExitCode::FAILURE
        }
    }
}
