use super::{json_pretty, EXIT_SUCCESS};
use wheelhouse_core::HelmfilePlatform;
use wheelhouse_schema::{TemplateSource, ToolSelection};

fn describe_tool(selection: &ToolSelection) -> String {
    match selection {
        ToolSelection::Default => "default".to_owned(),
        ToolSelection::Pinned(version) => format!("version {version}"),
        ToolSelection::Explicit(path) => path.display().to_string(),
    }
}

pub fn run(platform: &HelmfilePlatform, json: bool) -> Result<u8, String> {
    let config = platform.config().map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "valid": true,
            "config": config,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("configuration is valid");
    println!("  chart file:       {}", config.chart_file.display());
    if let Some(dir) = &config.working_dir {
        println!("  working dir:      {}", dir.display());
    }
    if let Some(ns) = &config.namespace {
        println!("  namespace:        {ns}");
    }
    if !config.selectors.is_empty() {
        println!("  selectors:        {}", config.selectors.join(", "));
    }
    if let Some(ctx) = &config.kube_context {
        println!("  kube context:     {ctx}");
    }
    println!("  helmfile:         {}", describe_tool(&config.helmfile));
    println!("  helm:             {}", describe_tool(&config.helm));
    if let Some(version) = &config.helm_diff {
        println!("  helm-diff:        version {version}");
    }
    match &config.values_template {
        TemplateSource::Inline(_) => println!("  values template:  inline"),
        TemplateSource::File(path) => println!("  values template:  {}", path.display()),
    }
    Ok(EXIT_SUCCESS)
}
