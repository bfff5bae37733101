//! Build, deploy and test orchestration
//!
//! Stages run strictly in order and the first failure stops the run. Each
//! stage is also callable on its own, which is how the CLI verbs use them.

use crate::engine::{BuildRequest, ContainerEngine, RunRequest};
use crate::error::{PipelineError, PipelineResult};
use crate::health::{ContainerHealthSource, HealthPoller, HealthSource, HttpHealthSource};
use crate::models::{BuildInfo, TestReport, TestSummary};
use crate::observability::StructuredLogger;
use crate::probe::HttpProbe;
use crate::suite::{write_report, TestSuite};
use crate::vcs::SourceControl;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

pub const BUILD_INFO_FILE: &str = "build-info.json";
pub const TEST_REPORT_FILE: &str = "test-report.json";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Deploy,
    Test,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Deploy => "deploy",
            Stage::Test => "test",
        }
    }
}

/// Where deployment health is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheck {
    /// The engine's health check status
    #[default]
    Container,
    /// The application's `/health` endpoint
    Http,
}

/// Everything a run needs to know about the application
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image: String,
    pub container: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub no_cache: bool,
    pub host_port: u16,
    pub container_port: u16,
    pub env: Vec<(String, String)>,
    pub health_check: HealthCheck,
    pub poller: HealthPoller,
    /// Directory for `build-info.json` and the test report
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image: "sample-app".to_string(),
            container: "sample-app".to_string(),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            no_cache: false,
            host_port: 8000,
            container_port: 8000,
            env: Vec::new(),
            health_check: HealthCheck::default(),
            poller: HealthPoller::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Result of one stage
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub success: bool,
    pub elapsed_ms: u64,
    pub detail: String,
}

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub app: String,
    pub stages: Vec<StageOutcome>,
    pub build: Option<BuildInfo>,
    pub tests: Option<TestSummary>,
}

impl PipelineReport {
    pub fn success(&self) -> bool {
        !self.stages.is_empty() && self.stages.iter().all(|s| s.success)
    }

    pub fn failed_stage(&self) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| !s.success)
    }

    /// Surface the failed stage, if any, as an error
    pub fn into_result(self) -> PipelineResult<PipelineReport> {
        match self.failed_stage() {
            Some(failed) => Err(PipelineError::StageFailed {
                stage: failed.stage.as_str().to_string(),
                cause: failed.detail.clone(),
            }),
            None => Ok(self),
        }
    }
}

/// Build → Deploy → Test for one application
pub struct Pipeline {
    engine: ContainerEngine,
    vcs: SourceControl,
    probe: HttpProbe,
    config: PipelineConfig,
    logger: StructuredLogger,
}

impl Pipeline {
    pub fn new(
        engine: ContainerEngine,
        vcs: SourceControl,
        probe: HttpProbe,
        config: PipelineConfig,
    ) -> Self {
        let logger = StructuredLogger::new(config.image.clone());
        Self {
            engine,
            vcs,
            probe,
            config,
            logger,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the image and record `build-info.json`
    pub async fn build(&self) -> PipelineResult<BuildInfo> {
        self.engine.ensure_available().await?;

        let branch = self.vcs.branch().await;
        let commit = self.vcs.commit().await;
        let tags = BuildInfo::default_tags(&self.config.image, &branch, &commit);

        let request = BuildRequest {
            tags: tags.clone(),
            dockerfile: self.config.dockerfile.clone(),
            context: self.config.context.clone(),
            build_args: vec![("BRANCH_NAME".to_string(), branch.clone())],
            no_cache: self.config.no_cache,
        };
        self.engine.build(&request).await?;

        let info = BuildInfo::new(branch, commit, tags);
        let path = self.config.output_dir.join(BUILD_INFO_FILE);
        std::fs::create_dir_all(&self.config.output_dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(&info)?)?;

        Ok(info)
    }

    /// Start the container and wait until it reports healthy
    pub async fn deploy(&self, branch: Option<&str>) -> PipelineResult<Duration> {
        let mut env = self.config.env.clone();
        if let Some(branch) = branch {
            if !env.iter().any(|(k, _)| k == "BRANCH_NAME") {
                env.push(("BRANCH_NAME".to_string(), branch.to_string()));
            }
        }

        let request = RunRequest {
            container: self.config.container.clone(),
            image: format!("{}:latest", self.config.image),
            host_port: self.config.host_port,
            container_port: self.config.container_port,
            env,
        };
        self.engine.run(&request).await?;

        self.wait_healthy().await
    }

    /// Poll the configured health source until a terminal state
    pub async fn wait_healthy(&self) -> PipelineResult<Duration> {
        let source: Box<dyn HealthSource> = match self.config.health_check {
            HealthCheck::Container => Box::new(ContainerHealthSource::new(
                self.engine.clone(),
                self.config.container.clone(),
            )),
            HealthCheck::Http => Box::new(HttpHealthSource::new(self.probe.clone())),
        };

        let poller = self.config.poller;
        let outcome = poller.wait(source.as_ref()).await;
        self.logger.log_health_poll(
            &source.describe(),
            outcome.state,
            outcome.elapsed,
            outcome.queries,
        );

        outcome.into_result(&self.config.container, poller.timeout())
    }

    /// Run the HTTP suite and write the report
    pub async fn test(&self) -> PipelineResult<TestReport> {
        let report = self.run_suite().await;
        self.write_test_report(&report)?;
        Ok(report)
    }

    async fn run_suite(&self) -> TestReport {
        let suite = TestSuite::new(self.probe.clone());
        let results = suite.run().await;
        let report = TestReport::new(suite.base_url(), results);

        self.logger.log_test_run(
            suite.base_url(),
            report.summary.total,
            report.summary.passed,
            report.summary.success_rate,
        );
        report
    }

    fn write_test_report(&self, report: &TestReport) -> PipelineResult<()> {
        write_report(report, &self.config.output_dir.join(TEST_REPORT_FILE))
    }

    /// Run every stage, stopping at the first failure
    pub async fn run(&self) -> PipelineReport {
        let mut report = PipelineReport {
            app: self.config.image.clone(),
            stages: Vec::new(),
            build: None,
            tests: None,
        };

        let build = self
            .stage(&mut report, Stage::Build, self.build(), |info: &BuildInfo| {
                format!("tagged {}", info.tags.join(", "))
            })
            .await;
        let Some(build) = build else {
            return report;
        };
        report.build = Some(build.clone());

        let deployed = self
            .stage(&mut report, Stage::Deploy, self.deploy(Some(&build.branch)), |elapsed: &Duration| {
                format!("healthy after {}ms", elapsed.as_millis())
            })
            .await;
        if deployed.is_none() {
            return report;
        }

        // This run's summary, kept even when the stage fails
        let mut summary = None;
        let gated = async {
            let test_report = self.run_suite().await;
            summary = Some(test_report.summary.clone());
            self.write_test_report(&test_report)?;
            test_gate(&test_report)
        };
        let tests = self
            .stage(&mut report, Stage::Test, gated, |summary: &TestSummary| {
                format!("{}/{} checks passed", summary.passed, summary.total)
            })
            .await;
        report.tests = tests.or(summary);

        report
    }

    async fn stage<T, F>(
        &self,
        report: &mut PipelineReport,
        stage: Stage,
        work: F,
        describe: impl FnOnce(&T) -> String,
    ) -> Option<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        self.logger.log_stage_started(stage.as_str());
        let start = Instant::now();
        let result = work.await;
        let elapsed = start.elapsed();

        let (value, success, detail) = match result {
            Ok(value) => {
                let detail = describe(&value);
                (Some(value), true, detail)
            }
            // Stage errors already name the stage; keep only the cause
            Err(PipelineError::StageFailed { cause, .. }) => (None, false, cause),
            Err(e) => (None, false, e.to_string()),
        };

        self.logger
            .log_stage_finished(stage.as_str(), elapsed, success, &detail);
        report.stages.push(StageOutcome {
            stage,
            success,
            elapsed_ms: elapsed.as_millis() as u64,
            detail,
        });

        value
    }
}

/// Any failed check fails the test stage
fn test_gate(report: &TestReport) -> PipelineResult<TestSummary> {
    let summary = report.summary.clone();
    if summary.failed > 0 {
        let failed: Vec<&str> = report
            .tests
            .iter()
            .filter(|t| !t.success)
            .map(|t| t.name.as_str())
            .collect();
        return Err(PipelineError::StageFailed {
            stage: Stage::Test.as_str().to_string(),
            cause: format!(
                "{} of {} checks failed: {}",
                summary.failed,
                summary.total,
                failed.join(", ")
            ),
        });
    }
    Ok(summary)
}
