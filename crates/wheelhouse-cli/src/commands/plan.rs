use super::{json_pretty, EXIT_SUCCESS};
use wheelhouse_core::{DeploymentRequest, HelmfilePlatform};

pub fn run(
    platform: &HelmfilePlatform,
    request: &DeploymentRequest,
    json: bool,
) -> Result<u8, String> {
    let plan = platform.plan(request).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "command": plan.command,
            "environment": plan.artifacts.environment,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{}", plan.command);
        println!("  working dir: {}", plan.command.working_dir.display());
        for (key, value) in &plan.command.env {
            println!("  env: {key}={value}");
        }
    }
    Ok(EXIT_SUCCESS)
}
