use serde::{Deserialize, Serialize};

use crate::commands::ParameterizedCommand;
use crate::keys::TriggerSequence;

/// Who defined a binding. At equal context depth and scheme, User wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    #[default]
    System,
    User,
}

/// A trigger sequence bound to a command within one context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub sequence: TriggerSequence,
    pub command: ParameterizedCommand,
    pub context_id: String,
    /// `None` means the binding is active under every scheme.
    pub scheme_id: Option<String>,
    pub kind: BindingKind,
}

impl Binding {
    pub fn new(
        sequence: TriggerSequence,
        command: ParameterizedCommand,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            command,
            context_id: context_id.into(),
            scheme_id: None,
            kind: BindingKind::System,
        }
    }

    pub fn with_scheme(mut self, scheme_id: impl Into<String>) -> Self {
        self.scheme_id = Some(scheme_id.into());
        self
    }

    pub fn user(mut self) -> Self {
        self.kind = BindingKind::User;
        self
    }
}
