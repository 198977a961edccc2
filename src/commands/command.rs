//! Parameterized command identity and its serialized string form.
//!
//! Serialized form: `id` or `id(key=value,key2=value2)`. The characters
//! `% ( ) , =` are escaped with a leading `%` wherever they appear in ids,
//! keys or values. Parameters are kept sorted so the output is stable.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

const ESCAPE: char = '%';
const SPECIAL: [char; 5] = ['%', '(', ')', ',', '='];

/// Errors that can occur when deserializing a command string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("serialized command is empty")]
    Empty,
    #[error("unbalanced parentheses in '{0}'")]
    Unbalanced(String),
    #[error("parameter '{0}' has no value")]
    MissingValue(String),
    #[error("dangling escape character in '{0}'")]
    DanglingEscape(String),
}

/// A command id plus its parameter values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterizedCommand {
    id: String,
    parameters: BTreeMap<String, String>,
}

impl ParameterizedCommand {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn serialize(&self) -> String {
        let mut out = escape(&self.id);
        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
                .collect::<Vec<_>>()
                .join(",");
            out.push('(');
            out.push_str(&params);
            out.push(')');
        }
        out
    }

    pub fn deserialize(s: &str) -> Result<Self, CommandParseError> {
        if s.is_empty() {
            return Err(CommandParseError::Empty);
        }

        let command = match find_unescaped(s, '(') {
            None => {
                if find_unescaped(s, ')').is_some() {
                    return Err(CommandParseError::Unbalanced(s.to_string()));
                }
                Self::new(unescape(s)?)
            }
            Some(open) => {
                let rest = &s[open + 1..];
                let close = find_unescaped(rest, ')');
                if rest.is_empty() || close != Some(rest.len() - 1) {
                    return Err(CommandParseError::Unbalanced(s.to_string()));
                }
                let mut command = Self::new(unescape(&s[..open])?);
                let body = &rest[..rest.len() - 1];
                if !body.is_empty() {
                    for part in split_unescaped(body, ',') {
                        let eq = find_unescaped(part, '=')
                            .ok_or_else(|| CommandParseError::MissingValue(part.to_string()))?;
                        command
                            .parameters
                            .insert(unescape(&part[..eq])?, unescape(&part[eq + 1..])?);
                    }
                }
                command
            }
        };

        if command.id.trim().is_empty() {
            return Err(CommandParseError::Empty);
        }
        Ok(command)
    }
}

impl fmt::Display for ParameterizedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if SPECIAL.contains(&c) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

fn unescape(s: &str) -> Result<String, CommandParseError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(next) => out.push(next),
                None => return Err(CommandParseError::DanglingEscape(s.to_string())),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn find_unescaped(s: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == target {
            return Some(i);
        }
    }
    None
}

fn split_unescaped(s: &str, delim: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == delim {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}
