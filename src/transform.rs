//! Transform stage: `dbt deps` then `dbt build` against the loaded tables.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{info, instrument};

use crate::config::TransformConfig;
use crate::error::{PipelineError, Result};

/// The dbt sub-commands run, in order
pub const DBT_STEPS: [&str; 2] = ["deps", "build"];

/// Runs the dbt project as child processes
#[derive(Debug, Clone)]
pub struct DbtRunner {
    executable: String,
    project_dir: PathBuf,
    profiles_dir: PathBuf,
}

impl DbtRunner {
    /// Runner for the configured executable and directories
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            executable: config.dbt_executable.clone(),
            project_dir: PathBuf::from(&config.project_dir),
            profiles_dir: PathBuf::from(&config.profiles_dir),
        }
    }

    /// Arguments for one dbt step
    pub fn args(step: &str, project_dir: &Path, profiles_dir: &Path) -> Vec<String> {
        vec![
            step.to_string(),
            "--profiles-dir".to_string(),
            profiles_dir.display().to_string(),
            "--project-dir".to_string(),
            project_dir.display().to_string(),
        ]
    }

    /// Project and profiles directories as absolute paths.
    ///
    /// Configured paths are relative to this process's working directory, but
    /// dbt runs inside the project directory and resolves its flags there.
    pub async fn resolve_dirs(&self) -> Result<(PathBuf, PathBuf)> {
        let project_dir = tokio::fs::canonicalize(&self.project_dir).await?;
        let profiles_dir = tokio::fs::canonicalize(&self.profiles_dir).await?;
        Ok((project_dir, profiles_dir))
    }

    /// Run one step; output goes straight to this process's stdout/stderr
    #[instrument(skip(self))]
    pub async fn run_step(&self, step: &str) -> Result<()> {
        let (project_dir, profiles_dir) = self.resolve_dirs().await?;
        let args = Self::args(step, &project_dir, &profiles_dir);
        info!("Running {} {}", self.executable, args.join(" "));

        let status = Command::new(&self.executable)
            .args(&args)
            .current_dir(&project_dir)
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            return Err(PipelineError::Transform {
                step: step.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Resolve dependencies, then build every model
    pub async fn run(&self) -> Result<()> {
        for step in DBT_STEPS {
            self.run_step(step).await?;
        }
        info!("dbt build finished");
        Ok(())
    }
}
