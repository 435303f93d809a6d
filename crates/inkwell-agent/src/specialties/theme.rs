// ABOUTME: Theme analyst: identifies central themes, motifs, and tone.
// ABOUTME: Listens to outline and plot notes, since structure shifts emphasis.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use super::{SpecialtyProfile, list, react_with, render_prompt, shape_with, text};
use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser};

pub static PROFILE: SpecialtyProfile = SpecialtyProfile {
    specialty: Specialty::Theme,
    default_template: "Identify the central themes, recurring motifs, and overall tone of project \
                       '{project}'. Name each theme plainly and point to where it surfaces.\n\n\
                       Request: {input}",
    fields: &[list("themes"), list("motifs"), text("tone")],
    related: &[Specialty::Outline, Specialty::Plot],
    listens_to: &[Specialty::Outline, Specialty::Plot],
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
