// ABOUTME: Character designer: names, traits, motivation, and arc for the cast.
// ABOUTME: Reacts to world and relationship notes; a character without a name needs another pass.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with, text};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Character,
    default_template: "Design a character for project '{project}'. Give a name, defining traits, \
                       what they want and why, and how they change over the story.\n\n\
                       Request: {input}",
    fields: &[
        text("name"),
        list("traits"),
        text("motivation"),
        text("arc"),
        text("backstory"),
    ],
    related: &[Specialty::Relationship, Specialty::Dialogue],
    listens_to: &[Specialty::World, Specialty::Relationship],
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

fn shape_output(_descriptor: &AgentDescriptor, parsed: ParsedResponse) -> AgentOutput {
    let output = shape_with(&PROFILE, parsed);
    let unnamed = !output.has_empty_data()
        && output
            .data
            .get("name")
            .and_then(|n| n.as_str())
            .is_none_or(|n| n.trim().is_empty());
    if unnamed {
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
        AgentDescriptor::new(
            "character-agent",
            Specialty::Character,
            ProviderKey::new(ProviderKind::Ollama, "m"),
        )
    }

    #[test]
    fn shapes_character_fields() {
        let parsed = ResponseParser::default().parse(
            "Meet Mara.\n[DATA]{\"name\": \"Mara\", \"traits\": \"stubborn\", \"arc\": [\"fear\", \"trust\"]}[/DATA]",
        );
        let output = shape_output(&desc(), parsed);

        assert_eq!(output.data["traits"], serde_json::json!(["stubborn"]));
        assert_eq!(output.data["arc"], "fear, trust");
        assert!(!output.needs_follow_up);
        assert_eq!(
            output.related_specialties,
            vec![Specialty::Relationship, Specialty::Dialogue]
        );
    }

    #[test]
    fn unnamed_character_needs_follow_up() {
        let parsed = ResponseParser::default().parse("Someone.\n[DATA]{\"traits\": [\"quiet\"]}[/DATA]");
        assert!(shape_output(&desc(), parsed).needs_follow_up);
    }

    #[test]
    fn ignores_dialogue_chatter() {
        let msg = CollaborationMessage::new("dialogue-agent", "Her lines feel stiff")
            .with_specialty(Specialty::Dialogue);
        let ctx = AgentContext::new("novel", "voice");
        assert!(on_collaboration(&desc(), &msg, &ctx, &ResponseParser::default()).is_none());

        let direct = msg.clone().to("character-agent");
        assert!(on_collaboration(&desc(), &direct, &ctx, &ResponseParser::default()).is_some());
    }
}
