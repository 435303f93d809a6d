// ABOUTME: Outline planner: turns premise and themes into acts, chapters, and beats.
// ABOUTME: Asks the model to honor any themes already settled by the theme analyst.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Outline,
    default_template: "Plan the structure of project '{project}': acts, chapters, and the key beat \
                       of each chapter.\n\nRequest: {input}",
    fields: &[list("acts"), list("chapters"), list("beats")],
    related: &[Specialty::Plot, Specialty::Theme],
    listens_to: &[Specialty::Theme, Specialty::Plot],
};

pub fn strategy() -> SpecialtyStrategy {
    SpecialtyStrategy {
        build_prompt,
        shape_output,
        on_collaboration,
    }
}

fn build_prompt(descriptor: &AgentDescriptor, context: &AgentContext, parser: &ResponseParser) -> String {
    let prompt = render_prompt(&PROFILE, descriptor, context, parser);
    if context.collaboration_data.contains_key(&Specialty::Theme) {
        format!(
            "{}\n\nEvery act should advance at least one of the established themes.",
            prompt
        )
    } else {
        prompt
    }
}

fn shape_output(_descriptor: &AgentDescriptor, parsed: ParsedResponse) -> AgentOutput {
    shape_with(&PROFILE, parsed)
}

fn on_collaboration(
    descriptor: &AgentDescriptor,
    message: &CollaborationMessage,
    context: &AgentContext,
    parser: &ResponseParser,
) -> Option<String> {
    react_with(&PROFILE, descriptor, message, context, parser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::{ProviderKey, ProviderKind};
    use serde_json::json;

    #[test]
    fn established_themes_shape_the_prompt() {
        let desc = AgentDescriptor::new(
            "outline-agent",
            Specialty::Outline,
            ProviderKey::new(ProviderKind::Ollama, "m"),
        );
        let parser = ResponseParser::default();

        let bare = build_prompt(&desc, &AgentContext::new("novel", "three acts"), &parser);
        assert!(!bare.contains("established themes"));

        let ctx = AgentContext::new("novel", "three acts")
            .with_collaboration(Specialty::Theme, json!({"themes": ["exile"]}));
        let prompt = build_prompt(&desc, &ctx, &parser);
        assert!(prompt.contains("established themes"));
        assert!(prompt.contains("exile"));
    }
}
