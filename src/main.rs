use std::io;
use std::process::ExitCode;
use std::thread;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use scrobble_skipper::{forward_control_lines, Settings, Skipper};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting scrobble-skipper");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Cannot start");
            return ExitCode::FAILURE;
        }
    };
    info!(?settings, "Configuration loaded");

    let skipper = match Skipper::from_settings(&settings) {
        Ok(skipper) => skipper,
        Err(e) => {
            error!(error = %e, "Cannot build provider clients");
            return ExitCode::FAILURE;
        }
    };

    let control = skipper.control_handle();
    let mut task = skipper.spawn();
    // stdin on a plain thread; the runtime never waits for a pending read.
    // If stdin closes, Ctrl-C still works.
    let stdin_control = control.clone();
    if let Err(e) = thread::Builder::new()
        .name("control-input".to_string())
        .spawn(move || forward_control_lines(io::stdin().lock(), &stdin_control))
    {
        warn!(error = %e, "Cannot read commands from stdin; only Ctrl-C will stop the skipper");
    }

    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "Listening for Ctrl-C failed");
            }
            control.exit();
        }
        res = &mut task => {
            if let Err(e) = res {
                error!(error = %e, "Poll loop ended unexpectedly");
                return ExitCode::FAILURE;
            }
            return ExitCode::SUCCESS;
        }
    }

    match timeout(settings.shutdown_grace, task).await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!(error = %e, "Poll loop ended unexpectedly");
            ExitCode::FAILURE
        }
        Err(_) => {
            warn!("Poll loop did not stop within the grace period");
            ExitCode::SUCCESS
        }
    }
}
