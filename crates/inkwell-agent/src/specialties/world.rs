// ABOUTME: World builder: setting, rules of the world, and notable locations.
// ABOUTME: Reacts to theme and plot notes that imply changes to the setting.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with, text};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::World,
    default_template: "Develop the world of project '{project}'. Describe the setting, the rules \
                       that govern it (magic, technology, society), and the places where the \
                       story happens.\n\nRequest: {input}",
    fields: &[text("setting"), list("rules"), list("locations"), text("history")],
    related: &[Specialty::Character, Specialty::Plot],
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
    render_prompt(&PROFILE, descriptor, context, parser)
}

/// A world without rules is still a sketch; ask for another pass.
fn shape_output(_descriptor: &AgentDescriptor, parsed: ParsedResponse) -> AgentOutput {
    let output = shape_with(&PROFILE, parsed);
    let missing_rules = !output.has_empty_data()
        && output.data.get("rules").and_then(|r| r.as_array()).is_none_or(|r| r.is_empty());
    if missing_rules {
        output.with_follow_up(true)
    } else {
        output
    }
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

    fn desc() -> AgentDescriptor {
        AgentDescriptor::new("world-agent", Specialty::World, ProviderKey::new(ProviderKind::Ollama, "m"))
    }

    #[test]
    fn world_without_rules_needs_follow_up() {
        let parser = ResponseParser::default();
        let sketch = shape_output(&desc(), parser.parse("A city. [DATA]{\"setting\": \"harbor\"}[/DATA]"));
        assert!(sketch.needs_follow_up);

        let full = shape_output(
            &desc(),
            parser.parse("A city. [DATA]{\"setting\": \"harbor\", \"rules\": \"no magic\"}[/DATA]"),
        );
        assert!(!full.needs_follow_up);
        assert_eq!(full.data["rules"][0], "no magic");
    }
}
