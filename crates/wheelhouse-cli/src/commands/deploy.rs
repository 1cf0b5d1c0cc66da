use super::{colorize_outcome, exit_code_for, json_pretty, SpinnerUi, EXIT_SUCCESS};
use std::time::Duration;
use wheelhouse_core::{
    install_signal_handler, shutdown_requested, DeploymentRequest, HelmfilePlatform, JobContext, LogUi, Platform, Ui,
};
use wheelhouse_runtime::CancelToken;

pub fn run(
    platform: &HelmfilePlatform,
    request: &DeploymentRequest,
    timeout: Option<u64>,
    json: bool,
) -> Result<u8, String> {
    let mut cancel = CancelToken::new();
    if let Some(secs) = timeout {
        cancel = cancel.with_timeout(Duration::from_secs(secs));
    }
    install_signal_handler(cancel.clone());

    let spinner_ui;
    let ui: &dyn Ui = if json {
        &LogUi
    } else {
        spinner_ui = SpinnerUi::new();
        &spinner_ui
    };

    match platform.deploy(&JobContext::new(cancel, ui), request) {
        Ok(result) => {
            if json {
                println!("{}", json_pretty(&result)?);
            } else {
                println!(
                    "deployed {} ({})",
                    result.name,
                    colorize_outcome(&result.outcome.to_string())
                );
                println!("id: {}", result.id);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            if json {
                let payload = serde_json::json!({
                    "app": request.app,
                    "status": if e.is_cancelled() { "cancelled" } else { "failed" },
                    "error": e.to_string(),
                });
                println!("{}", json_pretty(&payload)?);
            }
            if e.is_cancelled() && !shutdown_requested() {
                eprintln!("error: deployment timed out after {}s", timeout.unwrap_or_default());
            } else {
                eprintln!("error: {e}");
            }
            Ok(exit_code_for(&e))
        }
    }
}
