//! Trace propagation carried in message headers.

use std::collections::BTreeMap;

use uuid::Uuid;

pub const TRACEPARENT: &str = "traceparent";
pub const BAGGAGE: &str = "baggage";

/// String key/value pairs that travel with an event across services.
///
/// Follows the W3C `traceparent` layout: `00-<trace id>-<span id>-<flags>`.
/// Other entries (such as `baggage`) are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationContext {
    entries: BTreeMap<String, String>,
}

impl PropagationContext {
    /// Starts a new trace.
    pub fn new_root() -> Self {
        let trace_id = Uuid::new_v4().simple().to_string();
        let mut ctx = Self::default();
        ctx.entries
            .insert(TRACEPARENT.to_string(), format!("00-{trace_id}-{}-01", new_span_id()));
        ctx
    }

    /// Builds a context from raw header entries.
    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Derives the context for an event caused by this one.
    ///
    /// Keeps the trace id and every other entry; only the span id changes.
    /// A context without a usable trace parent starts a new trace.
    pub fn child(&self) -> Self {
        let Some(trace_id) = self.trace_id() else {
            let mut root = Self::new_root();
            for (key, value) in &self.entries {
                if key != TRACEPARENT {
                    root.entries.insert(key.clone(), value.clone());
                }
            }
            return root;
        };
        let mut child = self.clone();
        child.entries.insert(
            TRACEPARENT.to_string(),
            format!("00-{trace_id}-{}-01", new_span_id()),
        );
        child
    }

    /// Returns the trace id of the `traceparent` entry, if well formed.
    pub fn trace_id(&self) -> Option<&str> {
        let parent = self.entries.get(TRACEPARENT)?;
        let mut parts = parent.split('-');
        let _version = parts.next()?;
        let trace_id = parts.next()?;
        (trace_id.len() == 32 && trace_id.bytes().all(|b| b.is_ascii_hexdigit()))
            .then_some(trace_id)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
