// ABOUTME: The seven specialty strategies and the prompt/shaping helpers they share.
// ABOUTME: Each specialty declares its data fields, related specialties, and which peers it listens to.

pub mod character;
pub mod dialogue;
pub mod outline;
pub mod plot;
pub mod relationship;
pub mod theme;
pub mod world;

use serde_json::{Map, Value};

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, Specialty};

use crate::agent::SpecialtyStrategy;
use crate::parse::{ParsedResponse, ResponseParser, is_empty_object};

/// How a data field is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn text(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::Text,
    }
}

pub const fn list(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::List,
    }
}

/// Static facts about a specialty that its strategy functions draw on.
#[derive(Debug)]
pub struct SpecialtyProfile {
    pub specialty: Specialty,
    /// Used when a descriptor's prompt template is blank.
    pub default_template: &'static str,
    pub fields: &'static [Field],
    pub related: &'static [Specialty],
    /// Peers whose collaboration messages this specialty reacts to.
    pub listens_to: &'static [Specialty],
}

impl SpecialtyProfile {
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }
}

pub fn profile(specialty: Specialty) -> &'static SpecialtyProfile {
    match specialty {
        Specialty::Theme => &theme::PROFILE,
        Specialty::Outline => &outline::PROFILE,
        Specialty::World => &world::PROFILE,
        Specialty::Character => &character::PROFILE,
        Specialty::Relationship => &relationship::PROFILE,
        Specialty::Dialogue => &dialogue::PROFILE,
        Specialty::Plot => &plot::PROFILE,
    }
}

pub fn strategy_for(specialty: Specialty) -> SpecialtyStrategy {
    match specialty {
        Specialty::Theme => theme::strategy(),
        Specialty::Outline => outline::strategy(),
        Specialty::World => world::strategy(),
        Specialty::Character => character::strategy(),
        Specialty::Relationship => relationship::strategy(),
        Specialty::Dialogue => dialogue::strategy(),
        Specialty::Plot => plot::strategy(),
    }
}

/// Fill the template placeholders `{input}`, `{project}`, `{history}` and
/// `{collaboration}`. History and collaboration notes the template does not
/// place are appended, followed by the reply-format instructions.
pub(crate) fn render_prompt(
    profile: &SpecialtyProfile,
    descriptor: &AgentDescriptor,
    context: &AgentContext,
    parser: &ResponseParser,
) -> String {
    let template = if descriptor.prompt_template.trim().is_empty() {
        profile.default_template
    } else {
        descriptor.prompt_template.as_str()
    };

    let history = context.history_transcript();
    let collaboration = collaboration_notes(context);

    let mut prompt = fill_placeholders(
        template,
        &[
            ("{input}", context.user_input.as_str()),
            ("{project}", context.project_id.as_str()),
            ("{history}", history.as_str()),
            ("{collaboration}", collaboration.as_str()),
        ],
    );

    if !template.contains("{history}") && !history.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(&history);
    }
    if !template.contains("{collaboration}") && !collaboration.is_empty() {
        prompt.push_str("\n\nNotes from other specialists:\n");
        prompt.push_str(&collaboration);
    }

    prompt.push_str("\n\n");
    prompt.push_str(&parser.format_instructions(&profile.field_names()));
    prompt
}

/// Substitute placeholders in one left-to-right pass over the template.
/// Substituted text is never rescanned, so braces in user input survive.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match values.iter().find(|(name, _)| tail.starts_with(*name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// One block per contributing specialty, in specialty order.
pub(crate) fn collaboration_notes(context: &AgentContext) -> String {
    context
        .collaboration_data
        .iter()
        .filter(|(_, data)| !data.is_null() && !is_empty_object(data))
        .map(|(specialty, data)| {
            let body = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            format!("{}:\n{}", specialty.title(), body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Normalize declared fields: text fields become strings, list fields become arrays.
/// Undeclared keys pass through untouched.
pub(crate) fn normalize_fields(fields: &[Field], data: Value) -> Value {
    let Value::Object(mut map) = data else {
        return Value::Object(Map::new());
    };
    for field in fields {
        let Some(value) = map.remove(field.name) else {
            continue;
        };
        let normalized = match (field.kind, value) {
            (_, Value::Null) => continue,
            (FieldKind::Text, Value::String(s)) => Value::String(s),
            (FieldKind::Text, Value::Array(items)) => Value::String(
                items
                    .iter()
                    .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            (FieldKind::Text, other) => Value::String(other.to_string()),
            (FieldKind::List, Value::Array(items)) => Value::Array(items),
            (FieldKind::List, other) => Value::Array(vec![other]),
        };
        map.insert(field.name.to_string(), normalized);
    }
    Value::Object(map)
}

/// The shaping every specialty starts from.
pub(crate) fn shape_with(profile: &SpecialtyProfile, parsed: ParsedResponse) -> AgentOutput {
    let confidence = parsed.confidence();
    let follow_up = parsed.needs_follow_up();
    let data = normalize_fields(profile.fields, parsed.data);
    AgentOutput::new(parsed.content, confidence)
        .with_suggestions(parsed.suggestions)
        .with_data(data)
        .with_follow_up(follow_up)
        .with_related(profile.related.to_vec())
}

/// React to messages sent directly to this agent, from a person, or from a
/// specialty this profile listens to.
pub(crate) fn react_with(
    profile: &SpecialtyProfile,
    descriptor: &AgentDescriptor,
    message: &CollaborationMessage,
    context: &AgentContext,
    parser: &ResponseParser,
) -> Option<String> {
    let addressed = message.to_agent.as_deref() == Some(descriptor.id.as_str());
    let interested = match message.from_specialty {
        None => true,
        Some(from) => profile.listens_to.contains(&from),
    };
    if !addressed && !interested {
        return None;
    }
    Some(collaboration_prompt(profile, descriptor, message, context, parser))
}

pub(crate) fn collaboration_prompt(
    profile: &SpecialtyProfile,
    descriptor: &AgentDescriptor,
    message: &CollaborationMessage,
    context: &AgentContext,
    parser: &ResponseParser,
) -> String {
    let sender = match message.from_specialty {
        Some(specialty) => format!("{} ({})", message.from_agent, specialty.title()),
        None => message.from_agent.clone(),
    };

    let mut prompt = format!(
        "Project: {}\nCollaboration topic: {}\n\n{} shared:\n{}",
        context.project_id, context.user_input, sender, message.content
    );
    if !message.data.is_null() && !is_empty_object(&message.data) {
        prompt.push_str("\n\nAttached data:\n");
        prompt.push_str(&message.data.to_string());
    }
    let notes = collaboration_notes(context);
    if !notes.is_empty() {
        prompt.push_str("\n\nWhat the team has settled so far:\n");
        prompt.push_str(&notes);
    }
    prompt.push_str(&format!(
        "\n\nAs {}, respond with what this changes or adds from your perspective.\n\n",
        descriptor.specialty.title()
    ));
    prompt.push_str(&parser.format_instructions(&profile.field_names()));
    prompt
}
