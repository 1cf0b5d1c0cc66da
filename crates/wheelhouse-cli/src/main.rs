mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;
use wheelhouse_core::{DeploymentRequest, ImageRef};

#[derive(Debug, Parser)]
#[command(
    name = "wheelhouse",
    version,
    about = "Render values templates and deploy applications with helmfile"
)]
struct Cli {
    /// Path to the plugin configuration file.
    #[arg(short, long, default_value = "wheelhouse.toml", global = true)]
    config: PathBuf,

    /// Directory holding pinned helmfile, helm, and helm-diff versions.
    #[arg(long, global = true)]
    tool_cache: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// Application name; prefixes the deployment name.
    #[arg(long)]
    app: String,
    /// Image to deploy, as NAME[:TAG].
    #[arg(long)]
    image: ImageRef,
    /// Workspace name exposed to templates as `Workspace`.
    #[arg(long, default_value = "default")]
    workspace: String,
    /// Environment variable exposed to templates under `Env` (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,
    /// Extra template input exposed under `Input` (repeatable).
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    input: Vec<(String, String)>,
    /// Application source root; `dir` in the config is relative to it.
    #[arg(long, default_value = ".")]
    app_path: PathBuf,
}

impl RequestArgs {
    fn into_request(self) -> DeploymentRequest {
        let mut request = DeploymentRequest::new(self.app, self.image);
        request.workspace = self.workspace;
        request.env = self.env.into_iter().collect();
        request.input = self.input.into_iter().collect();
        request.app_path = self.app_path;
        request
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render templates and run `helmfile apply` for one application.
    Deploy {
        #[command(flatten)]
        request: RequestArgs,
        /// Cancel the deployment after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Load and validate the configuration file.
    Validate,
    /// Print the rendered values file and environment name.
    Render {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the helmfile command a deployment would run, without running it.
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Check configuration, tool cache, and helmfile/helm availability.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WHEELHOUSE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let tool_cache = cli.tool_cache.as_deref();
    let platform = || commands::configured_platform(&cli.config, tool_cache);

    let result = match cli.command {
        Commands::Deploy { request, timeout } => platform().and_then(|p| {
            commands::deploy::run(&p, &request.into_request(), timeout, json_output)
        }),
        Commands::Validate => platform().and_then(|p| commands::validate::run(&p, json_output)),
        Commands::Render { request } => platform()
            .and_then(|p| commands::render::run(&p, &request.into_request(), json_output)),
        Commands::Plan { request } => platform()
            .and_then(|p| commands::plan::run(&p, &request.into_request(), json_output)),
        Commands::Doctor => commands::doctor::run(&cli.config, tool_cache, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:") {
                EXIT_CONFIG_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
