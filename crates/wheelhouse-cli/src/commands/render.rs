use super::{json_pretty, EXIT_SUCCESS};
use wheelhouse_core::{DeploymentRequest, HelmfilePlatform};

pub fn run(
    platform: &HelmfilePlatform,
    request: &DeploymentRequest,
    json: bool,
) -> Result<u8, String> {
    let artifacts = platform.render(request).map_err(|e| e.to_string())?;
    let values = std::fs::read_to_string(&artifacts.values_path)
        .map_err(|e| format!("failed to read rendered values: {e}"))?;
    let file_name = artifacts
        .values_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if json {
        let payload = serde_json::json!({
            "values_file": file_name,
            "values": values,
            "environment": artifacts.environment,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("# {file_name}");
        print!("{values}");
        if !values.ends_with('\n') {
            println!();
        }
        if artifacts.environment.is_empty() {
            println!("# environment: (none)");
        } else {
            println!("# environment: {}", artifacts.environment);
        }
    }
    Ok(EXIT_SUCCESS)
}
