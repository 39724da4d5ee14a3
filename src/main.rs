//! pedalmap binary: load a configuration, open the devices, run the matcher.

use clap::Parser;
use pedalmap::{device, Config, Error, Matcher, Result, ShellSink};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

/// Set by the signal handler; the run loop polls it between receives.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Map evdev input devices to shell commands.
#[derive(Parser, Debug)]
#[command(name = "pedalmap", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Suppress informational output
    #[arg(short, long)]
    quiet: bool,

    /// Print the compiled rule list after load
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    let default_filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(&args) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    if args.debug {
        for binding in &config.devices {
            println!("{binding}");
        }
        for rule in &config.rules {
            println!("{:>4}: {rule}", rule.source_line);
        }
    }
    log::info!(
        "loaded {} rules and {} devices from {}",
        config.rules.len(),
        config.devices.len(),
        args.config.display()
    );
    if config.devices.is_empty() {
        return Err(Error::NoDevices {
            file: args.config.display().to_string(),
        });
    }

    let (handle, events) = device::open_all(&config)?;
    let mut matcher = Matcher::new(&config, ShellSink);

    let handler = request_shutdown as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }

    while !SHUTDOWN.load(Ordering::SeqCst) {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => matcher.handle(event),
            // Timeout, check the shutdown flag
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // The channel only closes once every reader has died.
                handle.stop();
                return Err(Error::DevicesLost);
            }
        }
    }

    // Clean shutdown: stop the readers, ungrab the devices, exit 0.
    // Pending commands already handed to the shell run to completion on
    // their own; nothing else is drained.
    log::info!("shutting down");
    handle.stop();
    Ok(())
}
