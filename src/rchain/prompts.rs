//! Prompt templates with `{variable}` placeholders.
//!
//! `{{` and `}}` render literal braces, so JSON examples can live inside a
//! template. A [`ChatPromptTemplate`] is a list of role-tagged templates plus
//! optional history placeholders, and formats into a [`PromptValue`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::rchain::messages::{Message, Role};
use crate::rchain::runnables::{ChainError, Runnable};

/// Input map of a prompt template.
pub type Variables = HashMap<String, String>;

/// Builds [`Variables`] from `(name, value)` pairs of any displayable value.
pub fn variables<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Variables
where
    K: Into<String>,
    V: fmt::Display,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.to_string()))
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing value for template variable '{0}'")]
    MissingVariable(String),
    #[error("unmatched '{brace}' at byte {position} in template")]
    UnmatchedBrace { brace: char, position: usize },
    #[error("empty placeholder at byte {0} in template")]
    EmptyPlaceholder(usize),
    #[error("unknown message role '{0}'")]
    UnknownRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Single string template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
    partials: Variables,
}

impl PromptTemplate {
    pub fn from_template(template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            segments: parse_segments(template)?,
            partials: Variables::new(),
        })
    }

    /// Names still required at format time, sorted.
    pub fn input_variables(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) if !self.partials.contains_key(name) => Some(name.clone()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Pre-fills one variable.
    pub fn partial(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.partials.insert(name.into(), value.to_string());
        self
    }

    pub fn format(&self, vars: &Variables) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = vars
                        .get(name)
                        .or_else(|| self.partials.get(name))
                        .ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' if chars.peek().is_some_and(|(_, next)| *next == '{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::UnmatchedBrace { brace: '{', position });
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(position));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name.to_string()));
            }
            '}' => return Err(TemplateError::UnmatchedBrace { brace: '}', position }),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MessageTemplate {
    Message(Role, PromptTemplate),
    /// Spliced with the history passed to [`ChatPromptTemplate::format_with_history`].
    Placeholder(String),
}

/// Role-tagged list of templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    messages: Vec<MessageTemplate>,
}

impl ChatPromptTemplate {
    /// Single human message.
    pub fn from_template(template: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            messages: vec![MessageTemplate::Message(
                Role::Human,
                PromptTemplate::from_template(template)?,
            )],
        })
    }

    /// Builds from `(role, template)` pairs.
    ///
    /// Roles: `system`, `human`/`user`, `ai`/`assistant`, and `placeholder`
    /// whose template names the history slot, e.g. `{chat_history}`.
    pub fn from_messages<R, T>(messages: impl IntoIterator<Item = (R, T)>) -> Result<Self, TemplateError>
    where
        R: AsRef<str>,
        T: AsRef<str>,
    {
        let messages = messages
            .into_iter()
            .map(|(role, template)| {
                let template = template.as_ref();
                let role = match role.as_ref() {
                    "system" => Role::System,
                    "human" | "user" => Role::Human,
                    "ai" | "assistant" => Role::Ai,
                    "placeholder" => {
                        let name = template.trim().trim_start_matches('{').trim_end_matches('}');
                        return Ok(MessageTemplate::Placeholder(name.to_string()));
                    }
                    other => return Err(TemplateError::UnknownRole(other.to_string())),
                };
                Ok(MessageTemplate::Message(role, PromptTemplate::from_template(template)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { messages })
    }

    pub fn input_variables(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                MessageTemplate::Message(_, template) => Some(template.input_variables()),
                MessageTemplate::Placeholder(_) => None,
            })
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Pre-fills `name` in every message template.
    pub fn partial(self, name: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        let messages = self
            .messages
            .into_iter()
            .map(|message| match message {
                MessageTemplate::Message(role, template) => {
                    MessageTemplate::Message(role, template.partial(name, &value))
                }
                placeholder => placeholder,
            })
            .collect();
        Self { messages }
    }

    pub fn format_prompt(&self, vars: &Variables) -> Result<PromptValue, TemplateError> {
        self.format_with_history(vars, &[])
    }

    /// Formats, splicing `history` into every placeholder.
    pub fn format_with_history(
        &self,
        vars: &Variables,
        history: &[Message],
    ) -> Result<PromptValue, TemplateError> {
        let mut messages = Vec::new();
        for template in &self.messages {
            match template {
                MessageTemplate::Message(role, template) => messages.push(Message {
                    role: *role,
                    content: template.format(vars)?,
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }),
                MessageTemplate::Placeholder(_) => messages.extend(history.iter().cloned()),
            }
        }
        Ok(PromptValue { messages })
    }
}

#[async_trait]
impl Runnable<Variables> for ChatPromptTemplate {
    type Output = PromptValue;

    async fn invoke(&self, input: Variables) -> Result<PromptValue, ChainError> {
        Ok(self.format_prompt(&input)?)
    }
}

/// Formatted prompt: an ordered message list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptValue {
    messages: Vec<Message>,
}

impl PromptValue {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl fmt::Display for PromptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, message) in self.messages.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}

impl From<&str> for PromptValue {
    fn from(text: &str) -> Self {
        Self {
            messages: vec![Message::human(text)],
        }
    }
}

impl From<String> for PromptValue {
    fn from(text: String) -> Self {
        Self {
            messages: vec![Message::human(text)],
        }
    }
}

impl From<Vec<Message>> for PromptValue {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl From<&[Message]> for PromptValue {
    fn from(messages: &[Message]) -> Self {
        Self {
            messages: messages.to_vec(),
        }
    }
}
