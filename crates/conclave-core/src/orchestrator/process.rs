//! Main turn loop
//!
//! `Routing → (DirectAnswer | Executing → Synthesizing) → Completed | Failed | Interrupted`.
//! The orchestrator run is always finalised before `handle_message`
//! returns, so no observer sees it stuck in `running`.

use super::config::MessageOptions;
use super::core::{ActiveTurn, Orchestrator};
use super::extraction::{spawn_extraction, ExtractionComplexity};
use super::routing::{build_routing_prompt, format_routing_history, RouteDecision};
use super::synthesis::NO_OUTPUT_MESSAGE;
use super::TurnOutcome;
use crate::agents::{AgentTask, SubAgentResult};
use crate::context::ExecutionContextCache;
use crate::error::{format_error_for_chat, Error, Result};
use crate::event_bus::OrchestratorEvent;
use crate::model::{AgentKind, AgentRun, ContextSection, MessageRole, Project, RunStatus, StoredMessage};
use crate::store::{ProjectStore, RunStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn aggregate_usage(results: &[SubAgentResult]) -> (f64, u64) {
    results
        .iter()
        .fold((0.0, 0), |(cost, tokens), r| (cost + r.cost_usd, tokens + r.tokens))
}

impl Orchestrator {
    /// Handle one user message for a project.
    ///
    /// Projects that have not finished setup get a setup session; all
    /// others go through routing, sub-agent execution and synthesis.
    #[tracing::instrument(skip_all, fields(project_id = %project_id))]
    pub async fn handle_message(
        &self,
        project_id: &str,
        content: &str,
        options: MessageOptions,
    ) -> Result<TurnOutcome> {
        let result = self.process_message(project_id, content, &options).await;
        if let Err(e) = &result {
            self.events.publish(OrchestratorEvent::ChatError {
                project_id: project_id.to_string(),
                message: format_error_for_chat(e),
            });
        }
        result
    }

    async fn process_message(
        &self,
        project_id: &str,
        content: &str,
        options: &MessageOptions,
    ) -> Result<TurnOutcome> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("project {project_id}")))?;
        self.check_budget(&project.id).await?;

        if options.persist {
            self.store
                .append_message(&StoredMessage::new(&project.id, MessageRole::User, content))
                .await?;
        }

        let model_alias = options.model.clone().unwrap_or_else(|| self.config.model.clone());
        let mut run = AgentRun::new(
            &project.id,
            AgentKind::Orchestrator,
            self.runner.model_id(Some(&model_alias)),
            content,
        );
        self.store.create_run(&run).await?;
        run.start();
        self.store.update_run(&run).await?;
        self.events.publish(OrchestratorEvent::AgentStarted {
            agent_id: run.id.clone(),
            project_id: project.id.clone(),
            agent_kind: AgentKind::Orchestrator,
            task: content.to_string(),
        });

        let turn = CancellationToken::new();
        self.active_turns.insert(
            project.id.clone(),
            ActiveTurn {
                run_id: run.id.clone(),
                token: turn.clone(),
            },
        );

        let result = if project.setup_completed {
            self.handle_normal_mode(&project, content, &model_alias, &mut run, &turn)
                .await
        } else {
            info!(project_id = %project.id, "Project in setup mode");
            self.handle_setup_mode(&project, content, &model_alias, &mut run, &turn)
                .await
        };
        self.active_turns.remove_if(&project.id, |_, t| t.run_id == run.id);

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if turn.is_cancelled() => {
                warn!(error = %e, run_id = %run.id, "Turn errored after interruption");
                self.runner.finalize(&mut run, RunStatus::Interrupted).await;
                Ok(TurnOutcome {
                    run_id: run.id.clone(),
                    status: run.status,
                    response: String::new(),
                    sub_agents: Vec::new(),
                })
            }
            Err(e) => {
                error!(error = %e, run_id = %run.id, "Orchestrator turn failed");
                self.runner.finalize(&mut run, RunStatus::Failed).await;
                Err(e)
            }
        }
    }

    async fn check_budget(&self, project_id: &str) -> Result<()> {
        if self.config.token_budget == 0 {
            return Ok(());
        }
        let budget = self.store.get_budget(project_id).await?;
        if budget.tokens_used >= self.config.token_budget {
            return Err(Error::BudgetExceeded {
                used: budget.tokens_used,
                budget: self.config.token_budget,
            });
        }
        Ok(())
    }

    async fn handle_normal_mode(
        &self,
        project: &Project,
        content: &str,
        model_alias: &str,
        run: &mut AgentRun,
        turn: &CancellationToken,
    ) -> Result<TurnOutcome> {
        // Phase 1: route
        info!(project_id = %project.id, "Phase 1: Routing");
        let history = self
            .store
            .recent_messages(&project.id, self.config.routing_history)
            .await?;
        let routing_prompt = build_routing_prompt(project, &history, self.config.routing_message_chars);
        self.events.publish(OrchestratorEvent::AgentContext {
            agent_id: run.id.clone(),
            project_id: project.id.clone(),
            sections: vec![
                ContextSection::new("System Prompt", routing_prompt.clone()),
                ContextSection::new("Task", content),
                ContextSection::new(
                    "Chat History",
                    format_routing_history(&history, self.config.routing_message_chars),
                ),
            ],
        });

        let model_id = run.model.clone();
        let decision = self.route_message(content, routing_prompt, &model_id, turn).await;
        let (agents, synthesis_hint) = match decision {
            None => return self.finish_interrupted(project, run, Vec::new()).await,
            Some(_) if turn.is_cancelled() => return self.finish_interrupted(project, run, Vec::new()).await,
            Some(RouteDecision::Direct(text)) => return self.finish_direct(project, content, run, text).await,
            Some(RouteDecision::Delegate {
                agents,
                synthesis_hint,
            }) => (agents, synthesis_hint),
        };

        // Phase 2: execute, strictly one agent at a time
        info!(project_id = %project.id, agent_count = agents.len(), "Phase 2: Executing sub-agents");
        let cache = ExecutionContextCache::new();
        let mut results = Vec::with_capacity(agents.len());
        for planned in agents {
            if turn.is_cancelled() {
                break;
            }
            let task = AgentTask::new(planned.agent_kind, planned.task_description)
                .with_model(Some(model_alias.to_string()))
                .with_parent(run.id.clone());
            let result = self.runner.run(project, task, &cache, turn).await;
            if result.status == RunStatus::Interrupted && !turn.is_cancelled() {
                info!(run_id = %result.run_id, "Agent interrupted individually, continuing");
            }
            results.push(result);
        }
        if turn.is_cancelled() {
            return self.finish_interrupted(project, run, results).await;
        }

        // Phase 3: synthesize
        let produced: Vec<SubAgentResult> = results
            .iter()
            .filter(|r| !r.response_text.is_empty())
            .cloned()
            .collect();
        let final_response = match produced.as_slice() {
            [] => NO_OUTPUT_MESSAGE.to_string(),
            [only] => only.response_text.clone(),
            many => {
                let text = self
                    .synthesize_results(project, content, many, synthesis_hint.as_deref(), &model_id, turn)
                    .await;
                if turn.is_cancelled() {
                    return self.finish_interrupted(project, run, results).await;
                }
                text
            }
        };

        self.events.publish(OrchestratorEvent::ChatMessage {
            project_id: project.id.clone(),
            role: MessageRole::Assistant,
            content: final_response.clone(),
        });

        // Post-processing
        self.record_usage(project, run, &results).await?;
        run.response_text = Some(final_response.clone());
        self.runner
            .context()
            .summaries()
            .update_from_response(&project.id, content, &final_response);
        self.store
            .append_message(
                &StoredMessage::new(&project.id, MessageRole::Assistant, &final_response).with_agent(&run.id),
            )
            .await?;
        self.maybe_extract(project, &final_response);

        self.runner.finalize(run, RunStatus::Completed).await;
        Ok(TurnOutcome {
            run_id: run.id.clone(),
            status: RunStatus::Completed,
            response: final_response,
            sub_agents: results,
        })
    }

    async fn finish_direct(
        &self,
        project: &Project,
        content: &str,
        run: &mut AgentRun,
        text: String,
    ) -> Result<TurnOutcome> {
        self.events.publish(OrchestratorEvent::ChatMessage {
            project_id: project.id.clone(),
            role: MessageRole::Assistant,
            content: text.clone(),
        });
        run.response_text = Some(text.clone());
        self.store
            .append_message(&StoredMessage::new(&project.id, MessageRole::Assistant, &text).with_agent(&run.id))
            .await?;
        self.runner
            .context()
            .summaries()
            .update_from_response(&project.id, content, &text);

        self.runner.finalize(run, RunStatus::Completed).await;
        Ok(TurnOutcome {
            run_id: run.id.clone(),
            status: RunStatus::Completed,
            response: text,
            sub_agents: Vec::new(),
        })
    }

    /// Global abort: keep what the agents produced, persist it and mark the
    /// orchestrator run interrupted.
    async fn finish_interrupted(
        &self,
        project: &Project,
        run: &mut AgentRun,
        results: Vec<SubAgentResult>,
    ) -> Result<TurnOutcome> {
        info!(project_id = %project.id, collected = results.len(), "Turn interrupted");
        self.record_usage(project, run, &results).await?;

        let partial = results
            .iter()
            .filter(|r| !r.response_text.is_empty())
            .map(|r| r.response_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !partial.is_empty() {
            run.response_text = Some(partial.clone());
            self.store
                .append_message(
                    &StoredMessage::new(&project.id, MessageRole::Assistant, &partial).with_agent(&run.id),
                )
                .await?;
        }

        self.runner.finalize(run, RunStatus::Interrupted).await;
        Ok(TurnOutcome {
            run_id: run.id.clone(),
            status: RunStatus::Interrupted,
            response: partial,
            sub_agents: results,
        })
    }

    /// Roll sub-agent usage into the orchestrator run and the project budget
    async fn record_usage(&self, project: &Project, run: &mut AgentRun, results: &[SubAgentResult]) -> Result<()> {
        let (cost, tokens) = aggregate_usage(results);
        run.cost_usd = cost;
        run.input_tokens = tokens;
        run.output_tokens = 0;
        if tokens > 0 || cost > 0.0 {
            let budget = self.store.add_usage(&project.id, tokens, cost).await?;
            info!(
                project_id = %project.id,
                tokens_used = budget.tokens_used,
                cost_usd = budget.cost_usd,
                "Budget updated"
            );
        }
        Ok(())
    }

    fn maybe_extract(&self, project: &Project, response: &str) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        let len = response.chars().count();
        if len <= self.config.extraction_threshold {
            return;
        }
        let complexity = ExtractionComplexity::for_length(len, self.config.medium_complexity_threshold);
        spawn_extraction(
            extractor.clone(),
            project.workspace_id.clone(),
            project.id.clone(),
            response.to_string(),
            complexity,
        );
    }
}
