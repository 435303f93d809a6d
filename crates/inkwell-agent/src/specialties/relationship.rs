// ABOUTME: Relationship mapper: who is tied to whom, the dynamics, and the conflicts.
// ABOUTME: Reacts to character notes.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Relationship,
    default_template: "Map the relationships between the characters of project '{project}': who \
                       is bound to whom, what pulls them together, and what drives them apart.\n\n\
                       Request: {input}",
    fields: &[list("pairs"), list("dynamics"), list("conflicts")],
    related: &[Specialty::Character, Specialty::Dialogue, Specialty::Plot],
    listens_to: &[Specialty::Character],
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
