use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static SETUP: Once = Once::new();

pub const LOG_PATH_ENV: &str = "SSPI_CLIENT_LOG_PATH";
pub const LOG_LEVEL_ENV: &str = "SSPI_CLIENT_LOG_LEVEL";

/// Installs a global file logger when `SSPI_CLIENT_LOG_PATH` is set.
///
/// Events are filtered with the `SSPI_CLIENT_LOG_LEVEL` directive (e.g. `sspi_client=trace`).
/// Panics are logged as well. Calling this function more than once is harmless; only the first
/// call has an effect.
pub fn setup_logger() {
    SETUP.call_once(|| {
        let Some(path) = std::env::var_os(LOG_PATH_ENV).map(PathBuf::from) else {
            return;
        };

        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("[sspi-client] couldn't open log file {}: {e}", path.display());
                return;
            }
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file);

        let registered = tracing_subscriber::registry()
            .with(fmt_layer)
            .with(EnvFilter::from_env(LOG_LEVEL_ENV))
            .try_init();

        if registered.is_err() {
            eprintln!("[sspi-client] a global tracing subscriber is already installed");
            return;
        }

        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            if let Some(location) = panic.location() {
                error!(
                    message = %panic,
                    panic.file = location.file(),
                    panic.line = location.line(),
                    panic.column = location.column(),
                );
            } else {
                error!(message = %panic);
            }

            default_hook(panic);
        }));
    })
}
