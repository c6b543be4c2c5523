//! Shared fixtures for lifecycle BDD scenarios.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;
use thiserror::Error;
use vastbench::lifecycle::{Provisioning, RunPlan, Teardown};
use vastbench::marketplace::{InstanceId, OfferQuery};
use vastbench::readiness::ReadinessPoller;
use vastbench::test_support::{ScriptedMarketplace, ScriptedRunner};
use vastbench::transport::{ResultPaths, payload_commands};

pub const PATCH_FILE: &str = "patch.diff";
pub const SETUP_SCRIPT: &str = "setup_script.sh";

#[derive(Clone, Debug)]
pub struct LifecycleWorld {
    pub market: ScriptedMarketplace,
    pub runner: ScriptedRunner,
    pub root: Utf8PathBuf,
    pub cleanup: bool,
    pub existing_instance: Option<InstanceId>,
    pub outcome: Option<RunResult>,
    pub teardown: Option<Teardown>,
    pub workspace: Arc<TempDir>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunResult {
    Success(Option<String>),
    Failure(String),
}

#[derive(Clone, Debug, Error)]
pub enum LifecycleTestError {
    #[error("failed to create workspace: {0}")]
    Workspace(String),
}

impl LifecycleWorld {
    pub fn plan(&self) -> RunPlan {
        let provisioning = self.existing_instance.clone().map_or_else(
            || Provisioning::Launch {
                query: OfferQuery {
                    gpu_type: String::from("RTX_4090"),
                    num_gpus: 1,
                    region: Some(String::from("Asia")),
                },
                min_disk_gb: 32.0,
                image: String::from("vastai/base-image:cuda-12.8.1-auto"),
            },
            Provisioning::Attach,
        );
        RunPlan {
            provisioning,
            payload_files: vec![self.root.join(PATCH_FILE), self.root.join(SETUP_SCRIPT)],
            commands: payload_commands(SETUP_SCRIPT, "setup_output.log"),
            results: ResultPaths {
                remote: String::from("~/llama.cpp/results.out.txt"),
                local: self.root.join("vastai_results.txt"),
            },
            cleanup: self.cleanup,
        }
    }

    pub const fn poller() -> ReadinessPoller {
        ReadinessPoller::new(Duration::from_millis(1), Duration::from_millis(250))
    }
}

#[fixture]
pub fn lifecycle_world_result() -> Result<LifecycleWorld, LifecycleTestError> {
    build_world()
}

#[fixture]
pub fn lifecycle_world(
    lifecycle_world_result: Result<LifecycleWorld, LifecycleTestError>,
) -> LifecycleWorld {
    lifecycle_world_result
        .unwrap_or_else(|err| panic!("lifecycle fixture should initialise: {err}"))
}

pub fn build_world() -> Result<LifecycleWorld, LifecycleTestError> {
    let tmp = TempDir::new().map_err(|err| LifecycleTestError::Workspace(err.to_string()))?;
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).map_err(|path| {
        LifecycleTestError::Workspace(format!("non-utf8 tempdir path: {}", path.display()))
    })?;
    for (name, contents) in [(PATCH_FILE, "diff --git a/x b/x\n"), (SETUP_SCRIPT, "#!/bin/sh\n")] {
        fs::write(root.join(name), contents)
            .map_err(|err| LifecycleTestError::Workspace(format!("{name}: {err}")))?;
    }

    Ok(LifecycleWorld {
        market: ScriptedMarketplace::new(),
        runner: ScriptedRunner::new(),
        root,
        cleanup: true,
        existing_instance: None,
        outcome: None,
        teardown: None,
        workspace: Arc::new(tmp),
    })
}
