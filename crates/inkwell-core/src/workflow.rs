// ABOUTME: Declares workflows: ordered specialty steps with prerequisite step ids.
// ABOUTME: Validation rejects duplicate ids, unknown prerequisites, and dependency cycles.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::specialty::Specialty;

/// Reasons a workflow definition is not a valid dependency DAG.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("workflow '{0}' has no steps")]
    Empty(String),

    #[error("workflow '{workflow}' declares step '{step}' more than once")]
    DuplicateStep { workflow: String, step: String },

    #[error("step '{step}' depends on unknown step '{missing}'")]
    UnknownDependency { step: String, missing: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// One specialty-scoped unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub specialty: Specialty,
    /// Short label describing what the step asks of the agent.
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Hint that the step may run alongside neighbouring steps.
    #[serde(default)]
    pub parallel: bool,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, specialty: Specialty, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            specialty,
            action: action.into(),
            depends_on: Vec::new(),
            parallel: false,
        }
    }

    pub fn after(mut self, prerequisites: &[&str]) -> Self {
        self.depends_on = prerequisites.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.parallel = true;
        self
    }
}

/// A named, statically declared sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            steps,
        }
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Check that the steps form a dependency DAG.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Empty(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(WorkflowError::DuplicateStep {
                    workflow: self.id.clone(),
                    step: step.id.clone(),
                });
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(WorkflowError::UnknownDependency {
                        step: step.id.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        match self.find_cycle() {
            Some(cycle) => Err(WorkflowError::Cycle(cycle)),
            None => Ok(()),
        }
    }

    /// Depth-first search for a back edge; returns the cycle path if one exists.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let graph: HashMap<&str, Vec<&str>> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.depends_on.iter().map(String::as_str).collect()))
            .collect();

        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        for step in &self.steps {
            if !visited.contains(step.id.as_str())
                && visit(step.id.as_str(), &graph, &mut visited, &mut on_stack, &mut path)
            {
                return Some(path.into_iter().map(String::from).collect());
            }
        }
        None
    }

    /// Workflows available without any configuration.
    pub fn builtin() -> Vec<WorkflowDefinition> {
        let mut story = WorkflowDefinition::new(
            "story_foundation",
            "Story Foundation",
            vec![
                WorkflowStep::new("theme", Specialty::Theme, "identify core themes"),
                WorkflowStep::new("outline", Specialty::Outline, "draft the story outline")
                    .after(&["theme"])
                    .concurrent(),
                WorkflowStep::new("world", Specialty::World, "build the setting")
                    .after(&["theme"])
                    .concurrent(),
                WorkflowStep::new("character", Specialty::Character, "design the cast")
                    .after(&["theme", "world"]),
                WorkflowStep::new("relationship", Specialty::Relationship, "map relationships")
                    .after(&["character"]),
            ],
        );
        story.description =
            "Themes first, then outline and setting, then characters and their bonds".to_string();

        let mut cast = WorkflowDefinition::new(
            "character_development",
            "Character Development",
            vec![
                WorkflowStep::new("character", Specialty::Character, "deepen the character"),
                WorkflowStep::new("relationship", Specialty::Relationship, "map relationships")
                    .after(&["character"]),
                WorkflowStep::new("dialogue", Specialty::Dialogue, "define voice and speech")
                    .after(&["character", "relationship"]),
            ],
        );
        cast.description = "Character profile, relationships, then dialogue voice".to_string();

        let mut review = WorkflowDefinition::new(
            "chapter_review",
            "Chapter Review",
            vec![
                WorkflowStep::new("plot", Specialty::Plot, "review plot logic and pacing"),
                WorkflowStep::new("dialogue", Specialty::Dialogue, "polish dialogue")
                    .after(&["plot"]),
            ],
        );
        review.description = "Plot review followed by dialogue polish".to_string();

        vec![story, cast, review]
    }
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> bool {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    for &next in graph.get(node).map(Vec::as_slice).unwrap_or_default() {
        if on_stack.contains(next) {
            if let Some(start) = path.iter().position(|&n| n == next) {
                path.drain(0..start);
            }
            path.push(next);
            return true;
        }
        if !visited.contains(next) && visit(next, graph, visited, on_stack, path) {
            return true;
        }
    }

    on_stack.remove(node);
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_workflows_validate() {
        for workflow in WorkflowDefinition::builtin() {
            workflow
                .validate()
                .unwrap_or_else(|e| panic!("{} invalid: {}", workflow.id, e));
        }
    }

    #[test]
    fn rejects_empty_workflow() {
        let wf = WorkflowDefinition::new("empty", "Empty", Vec::new());
        assert_eq!(wf.validate(), Err(WorkflowError::Empty("empty".to_string())));
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let wf = WorkflowDefinition::new(
            "dup",
            "Dup",
            vec![
                WorkflowStep::new("a", Specialty::Theme, ""),
                WorkflowStep::new("a", Specialty::Plot, ""),
            ],
        );
        assert!(matches!(wf.validate(), Err(WorkflowError::DuplicateStep { .. })));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let wf = WorkflowDefinition::new(
            "unknown",
            "Unknown",
            vec![WorkflowStep::new("a", Specialty::Theme, "").after(&["ghost"])],
        );
        let err = wf.validate().unwrap_err();
        assert_eq!(
            err,
            WorkflowError::UnknownDependency {
                step: "a".to_string(),
                missing: "ghost".to_string()
            }
        );
    }

    #[test]
    fn rejects_cycles_with_path() {
        let wf = WorkflowDefinition::new(
            "cyclic",
            "Cyclic",
            vec![
                WorkflowStep::new("a", Specialty::Theme, "").after(&["c"]),
                WorkflowStep::new("b", Specialty::World, "").after(&["a"]),
                WorkflowStep::new("c", Specialty::Character, "").after(&["b"]),
            ],
        );
        match wf.validate() {
            Err(WorkflowError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let wf = WorkflowDefinition::new(
            "self",
            "Self",
            vec![WorkflowStep::new("a", Specialty::Theme, "").after(&["a"])],
        );
        assert!(matches!(wf.validate(), Err(WorkflowError::Cycle(_))));
    }

    #[test]
    fn forward_references_are_allowed_when_acyclic() {
        // Declared order is not required to be topological; the engine skips such steps.
        let wf = WorkflowDefinition::new(
            "forward",
            "Forward",
            vec![
                WorkflowStep::new("a", Specialty::Theme, "").after(&["b"]),
                WorkflowStep::new("b", Specialty::World, ""),
            ],
        );
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn parses_from_yaml() {
        let yaml = r#"
id: quick
name: Quick
steps:
  - id: theme
    specialty: theme
  - id: plot
    specialty: plot
    action: check pacing
    depends_on: [theme]
    parallel: true
"#;
        let wf: WorkflowDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[1].depends_on, vec!["theme".to_string()]);
        assert!(wf.steps[1].parallel);
        assert!(wf.validate().is_ok());
    }
}
