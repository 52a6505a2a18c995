//! Layered plan execution
//!
//! Layers run strictly in order; the steps of one layer run concurrently
//! and all resolve before the next layer starts. Step state lives behind a
//! single lock so concurrent steps never interleave plan mutations.

use super::graph::compute_parallel_groups;
use super::rollback::RollbackManager;
use super::validate::validate_step_output;
use crate::agents::{AgentRunner, AgentTask};
use crate::context::ExecutionContextCache;
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::model::{Plan, PlanStatus, Project, QualityGateResult, RunStatus, StepStatus};
use crate::store::DataStore;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a workflow execution
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// Plan ID
    pub plan_id: String,
    /// Terminal plan status
    pub status: PlanStatus,
    /// Summed sub-agent cost
    pub cost_usd: f64,
    /// Summed sub-agent tokens
    pub tokens: u64,
}

/// What one step run reports back to the layer loop
#[derive(Debug, Default)]
struct StepReport {
    blocked_by_gate: bool,
    cost_usd: f64,
    tokens: u64,
}

/// Task string handed to a step's agent
#[must_use]
pub fn step_task(id: &str, title: &str, description: &str) -> String {
    format!("[Workflow Step {id}] {title}\n\n{description}")
}

/// Runs plans layer by layer through the agent runner
#[derive(Clone)]
pub struct WorkflowExecutor {
    runner: AgentRunner,
    store: Arc<dyn DataStore>,
    events: EventBus,
    rollback: Option<RollbackManager>,
    model: Option<String>,
    /// Executions in flight keyed by plan ID
    active: Arc<DashMap<String, CancellationToken>>,
}

impl WorkflowExecutor {
    /// Create an executor
    pub fn new(runner: AgentRunner, store: Arc<dyn DataStore>, events: EventBus) -> Self {
        Self {
            runner,
            store,
            events,
            rollback: None,
            model: None,
            active: Arc::new(DashMap::new()),
        }
    }

    /// Capture recovery points before execution
    #[must_use]
    pub fn with_rollback(mut self, rollback: RollbackManager) -> Self {
        self.rollback = Some(rollback);
        self
    }

    /// Model alias for step agents
    #[must_use]
    pub fn with_model(mut self, alias: Option<String>) -> Self {
        self.model = alias;
        self
    }

    /// Whether the plan is executing
    #[must_use]
    pub fn is_running(&self, plan_id: &str) -> bool {
        self.active.contains_key(plan_id)
    }

    /// Stop a running plan. In-flight steps are interrupted and no further
    /// layer starts. Returns false when the plan is not running.
    pub fn cancel(&self, plan_id: &str) -> bool {
        if let Some((_, token)) = self.active.remove(plan_id) {
            token.cancel();
            info!(plan_id = %plan_id, "Workflow cancelled");
            true
        } else {
            false
        }
    }

    /// Execute `plan` to a terminal status.
    ///
    /// Steps completed in an earlier run are kept; every other step starts
    /// over, so a failed plan can be resumed after fixing the cause.
    #[tracing::instrument(skip_all, fields(plan_id = %plan.id, project_id = %project.id))]
    pub async fn execute(&self, mut plan: Plan, project: &Project) -> Result<WorkflowOutcome> {
        if self.is_running(&plan.id) {
            return Err(Error::Workflow(format!("plan {} is already executing", plan.id)));
        }

        let groups = match plan.workflow_metadata.as_ref() {
            Some(m) if !m.parallel_groups.is_empty() => m.parallel_groups.clone(),
            _ => compute_parallel_groups(&plan.steps)?,
        };

        if let Some(rollback) = &self.rollback {
            rollback.capture(&mut plan, project).await;
        }

        let token = CancellationToken::new();
        self.active.insert(plan.id.clone(), token.clone());
        let plan_id = plan.id.clone();
        let result = self.run_layers(plan, project, &groups, &token).await;
        self.active.remove(&plan_id);
        result
    }

    async fn run_layers(
        &self,
        mut plan: Plan,
        project: &Project,
        groups: &[Vec<String>],
        token: &CancellationToken,
    ) -> Result<WorkflowOutcome> {
        for step in plan.steps.iter_mut().filter(|s| s.status != StepStatus::Completed) {
            step.status = StepStatus::Pending;
            step.result_summary = None;
        }
        plan.status = PlanStatus::Executing;
        self.save_plan(&mut plan).await?;
        self.publish_status(&plan);
        info!(layers = groups.len(), steps = plan.steps.len(), "Workflow started");

        let plan = Mutex::new(plan);
        let totals = self.drive_layers(&plan, project, groups, token).await;
        let mut plan = plan.into_inner();

        let (cost_usd, tokens) = match totals {
            Ok(totals) => totals,
            Err(e) => {
                warn!(error = %e, "Workflow aborted");
                self.abort(&mut plan, &e).await;
                return Err(e);
            }
        };

        plan.status = if token.is_cancelled() {
            PlanStatus::Cancelled
        } else if plan.steps.iter().all(|s| s.status == StepStatus::Completed) {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };
        self.save_plan(&mut plan).await?;
        self.publish_status(&plan);
        info!(status = %plan.status, cost_usd, tokens, "Workflow finished");

        Ok(WorkflowOutcome {
            plan_id: plan.id,
            status: plan.status,
            cost_usd,
            tokens,
        })
    }

    /// Run every layer and return the summed cost and tokens
    async fn drive_layers(
        &self,
        plan: &Mutex<Plan>,
        project: &Project,
        groups: &[Vec<String>],
        token: &CancellationToken,
    ) -> Result<(f64, u64)> {
        let cache = ExecutionContextCache::new();
        let mut cost_usd = 0.0;
        let mut tokens = 0;

        for (index, group) in groups.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }

            let runnable = self.prepare_layer(plan, group).await?;
            let reports = match runnable.as_slice() {
                [] => Vec::new(),
                [only] => vec![self.run_step(plan, project, only, &cache, token).await?],
                many => join_all(
                    many.iter()
                        .map(|id| self.run_step(plan, project, id, &cache, token)),
                )
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?,
            };

            cost_usd += reports.iter().map(|r| r.cost_usd).sum::<f64>();
            tokens += reports.iter().map(|r| r.tokens).sum::<u64>();

            self.checkpoint(plan, group).await?;

            if reports.iter().any(|r| r.blocked_by_gate) {
                warn!(layer = index, "Required quality gate failed, stopping workflow");
                self.skip_pending(plan).await?;
                break;
            }
        }
        Ok((cost_usd, tokens))
    }

    /// Finalize a plan whose layer loop hit an error. Steps left in
    /// progress fail with the error; the store write is best effort.
    async fn abort(&self, plan: &mut Plan, error: &Error) {
        let mut aborted = Vec::new();
        for step in plan.steps.iter_mut().filter(|s| s.status == StepStatus::InProgress) {
            step.status = StepStatus::Failed;
            step.result_summary = Some(format!("Aborted: {error}"));
            aborted.push(step.id.clone());
        }
        plan.status = PlanStatus::Failed;
        if let Err(e) = self.save_plan(plan).await {
            warn!(error = %e, "Failed to persist aborted workflow");
        }
        for id in &aborted {
            self.publish_step(plan, id);
        }
        self.publish_status(plan);
    }

    /// Skip steps blocked by an upstream failure and return the IDs that
    /// can run in this layer.
    async fn prepare_layer(&self, plan: &Mutex<Plan>, group: &[String]) -> Result<Vec<String>> {
        let mut plan = plan.lock().await;
        let mut runnable = Vec::new();
        let mut skipped = Vec::new();

        for id in group {
            let Some(step) = plan.step(id) else {
                warn!(step_id = %id, "Layer references an unknown step");
                continue;
            };
            let blocked = step.dependencies.iter().any(|dep| {
                plan.step(dep)
                    .is_some_and(|d| matches!(d.status, StepStatus::Failed | StepStatus::Skipped))
            });
            if blocked {
                skipped.push(id.clone());
            } else if step.status == StepStatus::Pending {
                runnable.push(id.clone());
            }
        }

        if !skipped.is_empty() {
            for id in &skipped {
                if let Some(step) = plan.step_mut(id) {
                    step.status = StepStatus::Skipped;
                    step.result_summary = Some("Skipped: a dependency failed".to_string());
                }
            }
            self.save_plan(&mut plan).await?;
            for id in &skipped {
                self.publish_step(&plan, id);
            }
        }
        Ok(runnable)
    }

    async fn run_step(
        &self,
        plan: &Mutex<Plan>,
        project: &Project,
        step_id: &str,
        cache: &ExecutionContextCache,
        token: &CancellationToken,
    ) -> Result<StepReport> {
        let step = {
            let mut guard = plan.lock().await;
            let step = guard
                .step_mut(step_id)
                .ok_or_else(|| Error::Workflow(format!("unknown step {step_id}")))?;
            step.status = StepStatus::InProgress;
            let step = step.clone();
            self.save_plan(&mut guard).await?;
            self.publish_step(&guard, step_id);
            step
        };

        let task = AgentTask::new(step.agent_kind, step_task(&step.id, &step.title, &step.description))
            .with_model(self.model.clone());
        let result = self.runner.run(project, task, cache, token).await;

        let mut report = StepReport {
            cost_usd: result.cost_usd,
            tokens: result.tokens,
            ..StepReport::default()
        };

        let mut guard = plan.lock().await;
        let plan_id = guard.id.clone();
        let (status, summary, gate_result) = match result.status {
            RunStatus::Completed => {
                let validation = validate_step_output(step.agent_kind, &result.response_text);
                match &step.quality_gate {
                    Some(gate) => {
                        let gate_result = QualityGateResult {
                            step_id: step.id.clone(),
                            passed: validation.valid,
                            output: validation.summary(),
                            timestamp: Utc::now(),
                        };
                        if !validation.valid && gate.required {
                            report.blocked_by_gate = true;
                            (
                                StepStatus::Failed,
                                format!("Quality gate failed: {}", validation.issues.join("; ")),
                                Some(gate_result),
                            )
                        } else {
                            (StepStatus::Completed, result.response_text.clone(), Some(gate_result))
                        }
                    }
                    None => (StepStatus::Completed, result.response_text.clone(), None),
                }
            }
            RunStatus::Interrupted => (StepStatus::Failed, "Interrupted".to_string(), None),
            _ => (
                StepStatus::Failed,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Agent run failed".to_string()),
                None,
            ),
        };

        if let Some(step) = guard.step_mut(step_id) {
            step.status = status;
            step.result_summary = Some(summary);
        }
        if let Some(gate_result) = &gate_result {
            guard
                .workflow_metadata
                .get_or_insert_with(Default::default)
                .quality_gate_results
                .insert(step_id.to_string(), gate_result.clone());
        }
        self.save_plan(&mut guard).await?;

        if let Some(gate_result) = gate_result {
            self.events.publish(OrchestratorEvent::WorkflowQualityGate {
                plan_id,
                result: gate_result,
            });
        }
        self.publish_step(&guard, step_id);
        info!(step_id = %step_id, status = %status, "Workflow step finished");
        Ok(report)
    }

    /// Move the checkpoint to the last completed step of the layer
    async fn checkpoint(&self, plan: &Mutex<Plan>, group: &[String]) -> Result<()> {
        let mut plan = plan.lock().await;
        let Some(last) = group
            .iter()
            .rev()
            .find(|id| plan.step(id).is_some_and(|s| s.status == StepStatus::Completed))
            .cloned()
        else {
            return Ok(());
        };

        plan.workflow_metadata
            .get_or_insert_with(Default::default)
            .checkpoint_step_id = Some(last.clone());
        self.save_plan(&mut plan).await?;
        self.events.publish(OrchestratorEvent::WorkflowCheckpoint {
            plan_id: plan.id.clone(),
            step_id: last,
        });
        Ok(())
    }

    async fn skip_pending(&self, plan: &Mutex<Plan>) -> Result<()> {
        let mut plan = plan.lock().await;
        let pending: Vec<String> = plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .map(|s| s.id.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        for id in &pending {
            if let Some(step) = plan.step_mut(id) {
                step.status = StepStatus::Skipped;
                step.result_summary = Some("Skipped: a required quality gate failed".to_string());
            }
        }
        self.save_plan(&mut plan).await?;
        for id in &pending {
            self.publish_step(&plan, id);
        }
        Ok(())
    }

    async fn save_plan(&self, plan: &mut Plan) -> Result<()> {
        plan.updated_at = Utc::now();
        self.store.update_plan(plan).await
    }

    fn publish_status(&self, plan: &Plan) {
        self.events.publish(OrchestratorEvent::PlanUpdated {
            plan_id: plan.id.clone(),
            project_id: plan.project_id.clone(),
            status: plan.status,
        });
    }

    fn publish_step(&self, plan: &Plan, step_id: &str) {
        if let Some(step) = plan.step(step_id) {
            self.events.publish(OrchestratorEvent::PlanStepUpdated {
                plan_id: plan.id.clone(),
                step_id: step.id.clone(),
                status: step.status,
                result_summary: step.result_summary.clone(),
            });
        }
    }
}
