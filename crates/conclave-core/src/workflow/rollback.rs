//! Recovery points and full-reset rollback

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{Plan, PlanStatus, Project, RollbackInfo, StepStatus};
use crate::store::DataStore;
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

/// Version control operations used for recovery points
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Current commit of the working tree at `dir`
    async fn head(&self, dir: &Path) -> Result<String>;
    /// Discard all changes and move the working tree to `rev`
    async fn reset_hard(&self, dir: &Path, rev: &str) -> Result<()>;
}

/// `git` on the PATH
#[derive(Debug, Clone, Copy, Default)]
pub struct GitVcs;

impl GitVcs {
    async fn git(dir: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| Error::Vcs(format!("failed to run git {}: {e}", args.join(" "))))?;
        if !output.status.success() {
            return Err(Error::Vcs(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn head(&self, dir: &Path) -> Result<String> {
        Self::git(dir, &["rev-parse", "HEAD"]).await
    }

    async fn reset_hard(&self, dir: &Path, rev: &str) -> Result<()> {
        Self::git(dir, &["reset", "--hard", rev]).await.map(|_| ())
    }
}

/// Captures a recovery point before a workflow and restores it on demand
#[derive(Clone)]
pub struct RollbackManager {
    vcs: Arc<dyn Vcs>,
    store: Arc<dyn DataStore>,
    events: EventBus,
}

impl RollbackManager {
    /// Create a manager
    pub fn new(vcs: Arc<dyn Vcs>, store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self { vcs, store, events }
    }

    /// Record the current commit in the plan's rollback info.
    ///
    /// Does nothing when rollback is disabled. A missing directory or a
    /// VCS failure leaves the plan without a recovery point.
    pub async fn capture(&self, plan: &mut Plan, project: &Project) {
        let Some(metadata) = plan.workflow_metadata.as_mut() else {
            return;
        };
        let checkpoint = metadata.checkpoint_step_id.clone();
        let Some(rollback) = metadata.rollback_info.as_mut().filter(|r| r.enabled) else {
            return;
        };
        let Some(dir) = project.directory_path.as_deref() else {
            warn!(plan_id = %plan.id, "No project directory, skipping recovery point");
            return;
        };

        match self.vcs.head(Path::new(dir)).await {
            Ok(sha) => {
                info!(plan_id = %plan.id, commit = %sha, "Recovery point captured");
                rollback.git_commit_before = Some(sha);
                rollback.last_good_step_id = checkpoint;
            }
            Err(e) => warn!(error = %e, plan_id = %plan.id, "Could not capture recovery point"),
        }
    }

    /// Revert the working tree to the captured commit and reset every step.
    ///
    /// On success the plan is back to `ready` with all steps pending.
    #[tracing::instrument(skip_all, fields(plan_id = %plan_id))]
    pub async fn rollback(&self, plan_id: &str, project: &Project) -> Result<Plan> {
        let mut plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("plan {plan_id}")))?;
        let sha = plan
            .workflow_metadata
            .as_ref()
            .and_then(|m| m.rollback_info.as_ref())
            .and_then(|r| r.git_commit_before.clone())
            .ok_or_else(|| Error::Workflow(format!("plan {plan_id} has no recovery point")))?;
        let dir = project
            .directory_path
            .as_deref()
            .ok_or_else(|| Error::Workflow(format!("project {} has no directory", project.id)))?;

        if let Err(e) = self.vcs.reset_hard(Path::new(dir), &sha).await {
            self.events.publish(OrchestratorEvent::WorkflowRollbackCompleted {
                plan_id: plan.id.clone(),
                success: false,
            });
            return Err(e);
        }

        for step in &mut plan.steps {
            step.status = StepStatus::Pending;
            step.result_summary = None;
        }
        if let Some(metadata) = plan.workflow_metadata.as_mut() {
            metadata.checkpoint_step_id = None;
            metadata.quality_gate_results.clear();
            metadata.rollback_info = Some(RollbackInfo {
                enabled: true,
                last_good_step_id: None,
                git_commit_before: Some(sha.clone()),
            });
        }
        plan.status = PlanStatus::Ready;
        plan.updated_at = Utc::now();
        self.store.update_plan(&plan).await?;

        self.events.publish(OrchestratorEvent::PlanUpdated {
            plan_id: plan.id.clone(),
            project_id: plan.project_id.clone(),
            status: plan.status,
        });
        self.events.publish(OrchestratorEvent::WorkflowRollbackCompleted {
            plan_id: plan.id.clone(),
            success: true,
        });
        info!(commit = %sha, "Workflow rolled back");
        Ok(plan)
    }
}
