use std::sync::atomic::{AtomicBool, Ordering};
use wheelhouse_runtime::CancelToken;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Route Ctrl-C to `cancel`. A second Ctrl-C exits immediately with status 130.
pub fn install_signal_handler(cancel: CancelToken) {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        cancel.cancel();
        eprintln!("\ncancellation requested, stopping helmfile...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
