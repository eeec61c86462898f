//! Accumulated context threaded through the agent chain.

use serde_json::{Map, Value};

/// The shared context an agent chain accumulates.
///
/// Starts as the caller-supplied input fields and grows by shallow-merging
/// each agent's parsed output. Every agent sees the full accumulated
/// context; keys produced by a later agent overwrite identically-named keys
/// from an earlier one; later agents are authoritative for their own
/// declared fields.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    fields: Map<String, Value>,
}

impl AgentContext {
    /// Seed the context from an initial input object.
    pub fn from_input(input: Map<String, Value>) -> Self {
        Self { fields: input }
    }

    /// Shallow-merge an agent's output into the context.
    pub fn merge(&mut self, output: Map<String, Value>) {
        for (key, value) in output {
            self.fields.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field as a display string, with a fallback for absent or non-string
    /// values (prompt builders never fail on a sparse context).
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.fields.get(key) {
            Some(Value::String(s)) => s,
            _ => default,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
