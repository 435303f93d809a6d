// ABOUTME: Plot reviewer: pacing, holes, and strengths of the story as drafted.
// ABOUTME: Listens to every specialty and widens its related list from the specialties it flags.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with, text};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Plot,
    default_template: "Review the plot of project '{project}'. Judge the pacing, point out holes \
                       and contradictions, name what works, and list the specialties (theme, \
                       outline, world, character, relationship, dialogue) each issue affects.\n\n\
                       Request: {input}",
    fields: &[
        list("issues"),
        text("pacing"),
        list("strengths"),
        list("affects"),
    ],
    related: &[Specialty::Outline, Specialty::Character],
    listens_to: &[
        Specialty::Theme,
        Specialty::Outline,
        Specialty::World,
        Specialty::Character,
        Specialty::Relationship,
        Specialty::Dialogue,
    ],
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

    let mut related = output.related_specialties.clone();
    let flagged = output
        .data
        .get("affects")
        .and_then(|a| a.as_array())
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .filter_map(|s| s.parse::<Specialty>().ok());
    for specialty in flagged {
        if specialty != Specialty::Plot && !related.contains(&specialty) {
            related.push(specialty);
        }
    }
    output.with_related(related)
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

    #[test]
    fn flagged_specialties_extend_related() {
        let desc = AgentDescriptor::new(
            "plot-agent",
            Specialty::Plot,
            ProviderKey::new(ProviderKind::Ollama, "m"),
        );
        let parsed = ResponseParser::default().parse(
            "Act two sags.\n[DATA]{\"issues\": [\"sag\"], \"affects\": [\"World\", \"outline\", \"plot\", \"weather\"]}[/DATA]",
        );
        let output = shape_output(&desc, parsed);
        assert_eq!(
            output.related_specialties,
            vec![Specialty::Outline, Specialty::Character, Specialty::World]
        );
    }
}
