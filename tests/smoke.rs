// ABOUTME: End-to-end smoke tests driving the orchestrator with scripted backends.
// ABOUTME: Covers skipped workflow steps, provider fallback, missing data sections, and record appends.

use std::sync::Arc;
use std::time::Duration;

use inkwell_agent::testing::ScriptedBackend;
use inkwell_agent::{Orchestrator, ProviderGateway, RetryPolicy, SkipReason};
use inkwell_core::{
    AgentContext, AgentDescriptor, InkwellConfig, ProviderErrorCode, ProviderKey, ProviderKind, Specialty,
    WorkflowDefinition, WorkflowStep,
};
use inkwell_store::{CollaborationStore, MemoryStore, SqliteStore};

fn primary() -> ProviderKey {
    ProviderKey::new(ProviderKind::Anthropic, "claude-test")
}

fn secondary() -> ProviderKey {
    ProviderKey::new(ProviderKind::Ollama, "llama3.1")
}

/// An orchestrator with the default roster bound to `primary()`.
fn orchestrator_with(
    backends: Vec<(ProviderKey, Arc<ScriptedBackend>)>,
    retry: RetryPolicy,
    store: Arc<dyn CollaborationStore>,
) -> Orchestrator {
    let mut gateway = ProviderGateway::new(retry);
    for (key, backend) in backends {
        gateway.register(key, backend);
    }
    let mut orchestrator = Orchestrator::new(gateway, store);
    for descriptor in AgentDescriptor::default_roster(&primary()) {
        orchestrator.add_agent(descriptor);
    }
    orchestrator
}

#[tokio::test]
async fn disabled_specialty_skips_its_step_and_dependents() {
    let backend = Arc::new(ScriptedBackend::replying("Themes of exile.[DATA]{\"themes\": [\"exile\"]}[/DATA]"));
    let store = Arc::new(MemoryStore::new());
    let mut orch = orchestrator_with(
        vec![(primary(), backend.clone())],
        RetryPolicy::no_retry(),
        store.clone(),
    );
    orch.register_workflow(WorkflowDefinition::new(
        "foundation_check",
        "Foundation check",
        vec![
            WorkflowStep::new("theme", Specialty::Theme, "identify themes"),
            WorkflowStep::new("world", Specialty::World, "sketch the world").after(&["theme"]),
            WorkflowStep::new("character", Specialty::Character, "design the lead").after(&["theme", "world"]),
        ],
    ))
    .unwrap();
    orch.disable_agent("world-agent").unwrap();

    let report = orch
        .run_workflow("foundation_check", AgentContext::new("novel", "A story about leaving home"))
        .await
        .unwrap();

    assert_eq!(report.completed, vec!["theme"]);
    assert!(matches!(report.skip_reason("world"), Some(SkipReason::NoAgent { .. })));
    assert!(matches!(
        report.skip_reason("character"),
        Some(SkipReason::DependencyUnmet { .. })
    ));
    assert!(report.outputs.contains_key("theme"));
    assert!(!report.outputs.contains_key("character"));
    assert_eq!(backend.calls(), 1);
    assert_eq!(store.record_count(), 1);
    assert_eq!(store.shared_data("novel").unwrap()[&Specialty::Theme]["themes"][0], "exile");
}

#[tokio::test(start_paused = true)]
async fn timing_out_primary_falls_back_to_second_provider() {
    let primary_backend = Arc::new(ScriptedBackend::failing(ProviderErrorCode::Timeout));
    let fallback_backend = Arc::new(ScriptedBackend::replying("The fallback answered."));
    let retry = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(8));
    let orch = orchestrator_with(
        vec![
            (primary(), primary_backend.clone()),
            (secondary(), fallback_backend.clone()),
        ],
        retry,
        Arc::new(MemoryStore::new()),
    );

    let output = orch
        .send_message("theme-agent", AgentContext::new("novel", "Themes?"))
        .await
        .unwrap();

    assert_eq!(output.content, "The fallback answered.");
    assert!(output.confidence() > 0.0);
    assert_eq!(primary_backend.calls(), 3);
    assert_eq!(fallback_backend.calls(), 1);
}

#[tokio::test]
async fn reply_without_data_section_keeps_full_text() {
    let reply = "Mara is stubborn and kind.\nShe wants to go home.";
    let backend = Arc::new(ScriptedBackend::replying(reply));
    let orch = orchestrator_with(
        vec![(primary(), backend)],
        RetryPolicy::no_retry(),
        Arc::new(MemoryStore::new()),
    );

    let output = orch
        .send_to_specialty(Specialty::Character, AgentContext::new("novel", "Who is Mara?"))
        .await
        .unwrap();

    assert_eq!(output.content, reply);
    assert!(output.data.as_object().is_some_and(|m| m.is_empty()));
    assert!(output.suggestions.is_empty());
}

#[tokio::test]
async fn identical_messages_are_both_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("inkwell.db");
    let backend = Arc::new(ScriptedBackend::replying("Same answer."));

    {
        let store = Arc::new(SqliteStore::open(&db).unwrap());
        let orch = orchestrator_with(vec![(primary(), backend)], RetryPolicy::no_retry(), store);
        let ctx = AgentContext::new("novel", "Same question");
        orch.send_message("plot-agent", ctx.clone()).await.unwrap();
        orch.send_message("plot-agent", ctx).await.unwrap();
    }

    let reopened = SqliteStore::open(&db).unwrap();
    let records = reopened.recent_records("novel", "plot-agent", 10).unwrap();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].record_id, records[1].record_id);
    assert_eq!(records[0].user_input, records[1].user_input);
}

#[tokio::test]
async fn config_without_provider_keys_still_builds() {
    let yaml = r#"
default_provider: ollama/llama3.1
providers:
  - kind: ollama
    model: llama3.1
  - kind: openai
    model: gpt-4o
"#;
    let mut config = InkwellConfig::from_yaml_str(yaml).unwrap();
    config.apply_env_with(|_| None).unwrap();

    let orch = Orchestrator::from_config(&config, Arc::new(MemoryStore::new())).unwrap();

    assert_eq!(orch.gateway().keys(), vec![secondary()]);
    assert_eq!(orch.list_available_agents().len(), Specialty::ALL.len());
    assert!(orch.list_workflows().iter().any(|w| w.id == "story_foundation"));
}

#[tokio::test]
async fn reply_with_suggestions_but_no_data_keeps_full_text() {
    let reply = "Mara hides a letter.\n[SUGGESTIONS]\n- reveal it in act three\n[/SUGGESTIONS]";
    let backend = Arc::new(ScriptedBackend::replying(reply));
    let orch = orchestrator_with(
        vec![(primary(), backend)],
        RetryPolicy::no_retry(),
        Arc::new(MemoryStore::new()),
    );

    let output = orch
        .send_to_specialty(Specialty::Character, AgentContext::new("novel", "What is Mara hiding?"))
        .await
        .unwrap();

    assert_eq!(output.content, reply);
    assert_eq!(output.suggestions, vec!["reveal it in act three"]);
    assert!(output.data.as_object().is_some_and(|m| m.is_empty()));
}
