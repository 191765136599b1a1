use bthome_logger::app::{Options, RealScanner, run_with_io};
use clap::Parser;
use std::io;
use std::panic::{self, PanicHookInfo};
use time::UtcOffset;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log to stderr at `warn`, or `debug` with `--verbose`. `RUST_LOG` wins.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Only sound while the process is single-threaded, so read it first
    let local_offset = UtcOffset::current_local_offset();

    // Set up panic hook to ensure clean exit codes for process managers
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let mut options = Options::parse();
    init_logging(options.verbose);
    match local_offset {
        Ok(offset) => options.utc_offset = offset,
        Err(e) => log::warn!("Local time zone unavailable, showing UTC: {e}"),
    }
    log::debug!("starting with {options:?}");

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    let result = tokio::select! {
        result = run_with_io(options, &RealScanner, &mut stdout, &mut stderr) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nStopping scanner...");
            Ok(())
        }
    };

    match result {
        Ok(()) => {
            eprintln!("✓ Scanner stopped");
            std::process::exit(EXIT_SUCCESS)
        }
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
