// ABOUTME: Workflow engine: runs a workflow's steps in order, feeding each step the data of earlier ones.
// ABOUTME: Steps with unmet prerequisites, no enabled agent, or a failed dispatch are skipped, never raised.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use inkwell_core::{AgentContext, AgentOutput, Specialty, WorkflowDefinition, WorkflowError, WorkflowStep};

use crate::agent::Agent;
use crate::gateway::ProviderGateway;
use crate::registry::AgentRegistry;

/// How steps marked `parallel` are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One step at a time in declaration order; the `parallel` hint is ignored.
    #[default]
    Sequential,
    /// Consecutive `parallel` steps whose prerequisites are already complete run together.
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    DependencyUnmet { missing: Vec<String> },
    NoAgent { specialty: Specialty },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub step_id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A step that reached an agent, whether or not it completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub step_id: String,
    pub agent_id: String,
    pub specialty: Specialty,
    /// The input the agent saw, including the step's action.
    pub user_input: String,
    pub completed: bool,
}

/// Everything a workflow run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow_id: String,
    /// Step id to output, including degraded outputs of failed steps.
    pub outputs: BTreeMap<String, AgentOutput>,
    /// Successfully completed steps, in completion order.
    pub completed: Vec<String>,
    pub skipped: Vec<SkippedStep>,
    pub executed: Vec<ExecutedStep>,
}

impl WorkflowReport {
    fn new(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed.iter().any(|s| s == step_id)
    }

    pub fn skip_reason(&self, step_id: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.step_id == step_id)
            .map(|s| &s.reason)
    }

    fn missing_prerequisites(&self, step: &WorkflowStep) -> Vec<String> {
        step.depends_on
            .iter()
            .filter(|dep| !self.is_completed(dep))
            .cloned()
            .collect()
    }

    fn skip(&mut self, step: &WorkflowStep, reason: SkipReason) {
        tracing::warn!(step = %step.id, reason = ?reason, "workflow step skipped");
        self.skipped.push(SkippedStep {
            step_id: step.id.clone(),
            reason,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowEngine {
    mode: ExecutionMode,
}

impl WorkflowEngine {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run a workflow. Fails only when the definition itself is invalid;
    /// step-level problems are reported in the returned report.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        context: &AgentContext,
        registry: &AgentRegistry,
        gateway: &ProviderGateway,
    ) -> Result<WorkflowReport, WorkflowError> {
        definition.validate()?;
        tracing::info!(workflow = %definition.id, steps = definition.steps.len(), mode = ?self.mode, "workflow started");

        let mut report = WorkflowReport::new(&definition.id);
        let mut shared: BTreeMap<Specialty, Value> = BTreeMap::new();
        let steps = &definition.steps;

        let mut start = 0;
        while start < steps.len() {
            let end = self.group_end(steps, start, &report);

            let mut planned: Vec<(&WorkflowStep, Arc<Agent>, AgentContext)> = Vec::new();
            for step in &steps[start..end] {
                let missing = report.missing_prerequisites(step);
                if !missing.is_empty() {
                    report.skip(step, SkipReason::DependencyUnmet { missing });
                    continue;
                }
                let Some(agent) = registry.resolve_by_specialty(step.specialty) else {
                    report.skip(
                        step,
                        SkipReason::NoAgent {
                            specialty: step.specialty,
                        },
                    );
                    continue;
                };
                planned.push((step, agent, step_context(step, context, &shared)));
            }

            let results = join_all(
                planned
                    .iter()
                    .map(|(_, agent, ctx)| agent.try_dispatch(gateway, ctx)),
            )
            .await;

            for ((step, agent, ctx), result) in planned.into_iter().zip(results) {
                let completed = result.is_ok();
                let output = match result {
                    Ok(output) => {
                        if !output.has_empty_data() {
                            shared.insert(step.specialty, output.data.clone());
                        }
                        report.completed.push(step.id.clone());
                        tracing::info!(step = %step.id, agent = %agent.id(), "workflow step completed");
                        output
                    }
                    Err(e) => {
                        let degraded = agent.degraded(&e);
                        report.skip(step, SkipReason::Failed { error: e.to_string() });
                        degraded
                    }
                };
                report.outputs.insert(step.id.clone(), output);
                report.executed.push(ExecutedStep {
                    step_id: step.id.clone(),
                    agent_id: agent.id().to_string(),
                    specialty: step.specialty,
                    user_input: ctx.user_input,
                    completed,
                });
            }

            start = end;
        }

        tracing::info!(
            workflow = %definition.id,
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            "workflow finished"
        );
        Ok(report)
    }

    /// Exclusive end of the batch starting at `start`: a run of ready
    /// `parallel` steps in concurrent mode, otherwise the single step.
    fn group_end(&self, steps: &[WorkflowStep], start: usize, report: &WorkflowReport) -> usize {
        let ready = |step: &WorkflowStep| step.parallel && report.missing_prerequisites(step).is_empty();
        if self.mode != ExecutionMode::Concurrent || !ready(&steps[start]) {
            return start + 1;
        }
        let mut end = start + 1;
        let mut ids: HashSet<&str> = HashSet::from([steps[start].id.as_str()]);
        while end < steps.len()
            && ready(&steps[end])
            && !steps[end].depends_on.iter().any(|d| ids.contains(d.as_str()))
        {
            ids.insert(steps[end].id.as_str());
            end += 1;
        }
        end
    }
}

/// The context a step's agent sees: the caller's context, the step action,
/// and the data of every step completed so far.
fn step_context(step: &WorkflowStep, base: &AgentContext, shared: &BTreeMap<Specialty, Value>) -> AgentContext {
    let mut ctx = base.clone();
    if !step.action.is_empty() {
        ctx.user_input = format!("Task: {}\n\n{}", step.action, base.user_input);
    }
    for (specialty, data) in shared {
        ctx.collaboration_data.insert(*specialty, data.clone());
    }
    ctx
}
