// ABOUTME: Dialogue stylist: voice, sample lines, and notes on how characters speak.
// ABOUTME: Keeps established character voices when character notes are present.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with, text};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Dialogue,
    default_template: "Refine dialogue for project '{project}'. Describe each speaker's voice, \
                       offer sample lines, and note what to cut or sharpen.\n\nRequest: {input}",
    fields: &[text("voice"), list("samples"), list("notes")],
    related: &[Specialty::Character, Specialty::Relationship],
    listens_to: &[Specialty::Character, Specialty::Relationship],
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
    if context.collaboration_data.contains_key(&Specialty::Character) {
        format!(
            "{}\n\nKeep each character's established voice; do not invent new speakers.",
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
