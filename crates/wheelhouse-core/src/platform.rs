use crate::command::{build_command, resolve_binaries};
use crate::identity::{deployment_name, IdentitySource};
use crate::lifecycle::{validate_transition, DeployStage};
use crate::progress::{StepGuard, Ui};
use crate::render::{render_inline, RenderWorkspace, TemplateContext};
use crate::request::{DeploymentRequest, DeploymentResult};
use crate::CoreError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wheelhouse_runtime::{BinaryResolver, CancelToken, CommandSpec, Outcome, RuntimeError, ToolRunner};
use wheelhouse_schema::{PluginConfig, RawConfig};

/// Per-call context supplied by the host.
pub struct JobContext<'a> {
    pub cancel: CancelToken,
    pub ui: &'a dyn Ui,
}

impl<'a> JobContext<'a> {
    pub fn new(cancel: CancelToken, ui: &'a dyn Ui) -> Self {
        Self { cancel, ui }
    }
}

/// The two operations a host drives a deployment plugin through.
pub trait Platform: Send + Sync {
    fn configure(&mut self, raw: &RawConfig) -> Result<(), CoreError>;
    fn deploy(
        &self,
        job: &JobContext<'_>,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, CoreError>;
}

/// Rendered values file and environment name for one request.
///
/// The values file lives in `workspace` and is removed when this is dropped.
pub struct RenderedArtifacts {
    pub workspace: RenderWorkspace,
    pub values_path: PathBuf,
    pub environment: String,
}

/// Everything a deployment would run, rendered but not executed.
pub struct Plan {
    pub artifacts: RenderedArtifacts,
    pub command: CommandSpec,
}

/// Deploys applications by rendering a values file and running `helmfile apply`.
///
/// Holds no per-deployment state, so one configured instance can serve
/// concurrent deployments.
pub struct HelmfilePlatform {
    config: Option<PluginConfig>,
    resolver: Arc<dyn BinaryResolver>,
    runner: Arc<dyn ToolRunner>,
    identity: Arc<dyn IdentitySource>,
}

impl HelmfilePlatform {
    pub fn new(
        resolver: Arc<dyn BinaryResolver>,
        runner: Arc<dyn ToolRunner>,
        identity: Arc<dyn IdentitySource>,
    ) -> Self {
        Self {
            config: None,
            resolver,
            runner,
            identity,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config(&self) -> Result<&PluginConfig, CoreError> {
        self.config.as_ref().ok_or(CoreError::NotConfigured)
    }

    /// Render the values file and environment name only.
    pub fn render(&self, request: &DeploymentRequest) -> Result<RenderedArtifacts, CoreError> {
        let config = self.config()?;
        let ctx = TemplateContext::from_request(request);
        let workspace = RenderWorkspace::new().map_err(CoreError::ValuesTemplate)?;
        let values_path = workspace
            .render_values(&config.values_template, &ctx)
            .map_err(CoreError::ValuesTemplate)?;
        let environment = render_environment(config, &ctx)?;
        Ok(RenderedArtifacts {
            workspace,
            values_path,
            environment,
        })
    }

    /// Render and assemble without executing.
    pub fn plan(&self, request: &DeploymentRequest) -> Result<Plan, CoreError> {
        let config = self.config()?;
        let artifacts = self.render(request)?;
        let binaries =
            resolve_binaries(config, self.resolver.as_ref()).map_err(CoreError::BinaryResolution)?;
        let command = build_command(
            config,
            &binaries,
            &artifacts.values_path,
            &artifacts.environment,
            &request.app_path,
        )?;
        Ok(Plan { artifacts, command })
    }

    fn run_stages(
        &self,
        config: &PluginConfig,
        job: &JobContext<'_>,
        request: &DeploymentRequest,
        run: &mut DeployRun<'_>,
    ) -> Result<DeploymentResult, CoreError> {
        run.enter(DeployStage::ResolveIdentity)?;
        let id = self
            .identity
            .component_id()
            .map_err(|e| CoreError::IdentityUnavailable(e.to_string()))?;
        let name = deployment_name(&request.app, &id);
        run.steps.done();

        run.enter(DeployStage::RenderValues)?;
        let ctx = TemplateContext::from_request(request);
        let workspace = RenderWorkspace::new().map_err(CoreError::ValuesTemplate)?;
        let values_path = workspace
            .render_values(&config.values_template, &ctx)
            .map_err(CoreError::ValuesTemplate)?;
        run.steps.done();

        run.enter(DeployStage::RenderEnvironmentName)?;
        let environment = render_environment(config, &ctx)?;
        run.steps.done();

        run.enter(DeployStage::ResolveBinaries)?;
        let binaries =
            resolve_binaries(config, self.resolver.as_ref()).map_err(CoreError::BinaryResolution)?;
        run.steps.done();

        run.enter(DeployStage::BuildArgs)?;
        let spec = build_command(config, &binaries, &values_path, &environment, &request.app_path)?;
        run.steps.done();

        run.enter(DeployStage::Execute)?;
        run.steps.update(&format!("Executing command: {spec}"));
        let outcome = self.execute(job, &spec)?;
        run.steps.update("Successfully finished running helmfile");
        run.steps.done();

        run.enter(DeployStage::AssembleResult)?;
        Ok(DeploymentResult {
            id,
            name,
            outcome,
            deployed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn execute(&self, job: &JobContext<'_>, spec: &CommandSpec) -> Result<Outcome, CoreError> {
        let ui = job.ui;
        let outcome = self
            .runner
            .run(spec, &job.cancel, &mut |line| ui.output(line))
            .map_err(|e| match e {
                RuntimeError::Cancelled => CoreError::Cancelled,
                other => CoreError::Runtime(other),
            })?;
        match outcome {
            Outcome::Failed { code, stderr } => Err(CoreError::Subprocess { code, stderr }),
            ok => Ok(ok),
        }
    }
}

impl Platform for HelmfilePlatform {
    fn configure(&mut self, raw: &RawConfig) -> Result<(), CoreError> {
        let config = raw.validate()?;
        info!(
            "configured helmfile deployment of {}",
            config.chart_file.display()
        );
        self.config = Some(config);
        Ok(())
    }

    fn deploy(
        &self,
        job: &JobContext<'_>,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, CoreError> {
        let config = self.config()?;
        info!(
            "deploying {} ({}) to workspace '{}'",
            request.app, request.image, request.workspace
        );

        let mut run = DeployRun {
            stage: DeployStage::Start,
            cancel: &job.cancel,
            steps: StepGuard::new(job.ui),
        };
        match self.run_stages(config, job, request, &mut run) {
            Ok(result) => {
                info!("deployed {} ({})", result.name, result.outcome);
                Ok(result)
            }
            Err(e) => {
                let failed_in = run.stage;
                run.fail();
                if e.is_cancelled() {
                    warn!("deployment of {} cancelled during {failed_in}", request.app);
                } else {
                    debug!("deployment of {} failed during {failed_in}: {e}", request.app);
                }
                Err(e)
            }
        }
    }
}

/// Stage tracking for one `deploy` call. Dropping it aborts any open step.
struct DeployRun<'a> {
    stage: DeployStage,
    cancel: &'a CancelToken,
    steps: StepGuard<'a>,
}

impl DeployRun<'_> {
    fn enter(&mut self, next: DeployStage) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        validate_transition(self.stage, next)?;
        debug!("stage {} -> {next}", self.stage);
        self.stage = next;
        if let Some(message) = next.step_message() {
            self.steps.begin(message);
        }
        Ok(())
    }

    fn fail(&mut self) {
        if validate_transition(self.stage, DeployStage::Failed).is_ok() {
            self.stage = DeployStage::Failed;
        }
    }
}

fn render_environment(config: &PluginConfig, ctx: &TemplateContext) -> Result<String, CoreError> {
    match &config.environment_template {
        Some(template) => {
            render_inline("environment_template", template, ctx).map_err(CoreError::EnvironmentTemplate)
        }
        None => Ok(String::new()),
    }
}
