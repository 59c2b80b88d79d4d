//! Immutable, insertion-ordered tag propagation.
//!
//! A [`Scope`] is a persistent structure: every derivation allocates one new
//! layer pointing at its parent's layers and never touches them. Siblings
//! derived from the same parent share the parent's layers but cannot observe
//! each other, whichever threads they run on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ids::{instance_id, SpanId};
use crate::sink::Sink;
use crate::value::{Tag, TagValue};

/// Key of the sentinel tag that ends every snapshot.
pub const INSTANCE_TAG: &str = "meta.instance";

/// Layer chains longer than this are flattened on the next derivation.
const MAX_LAYER_HEIGHT: usize = 32;

struct TagLayer {
    parent: Option<Arc<TagLayer>>,
    entries: Vec<Tag>,
    height: usize,
}

pub(crate) struct SinkLayer {
    parent: Option<Arc<SinkLayer>>,
    pub(crate) name: String,
    pub(crate) sink: Arc<dyn Sink>,
}

/// Identity of the span a scope is running inside.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanContext {
    pub id: SpanId,
    pub parent_id: Option<SpanId>,
    pub name: String,
    /// 1 for a root span.
    pub depth: u32,
    pub start: DateTime<Utc>,
}

/// Propagation unit carrying tags, span identity and scope-local sinks.
///
/// Cloning is cheap (three reference counts). Scopes are created empty with
/// [`Scope::root`] and otherwise only by derivation.
#[derive(Clone, Default)]
pub struct Scope {
    tags: Option<Arc<TagLayer>>,
    span: Option<Arc<SpanContext>>,
    sinks: Option<Arc<SinkLayer>>,
}

impl Scope {
    /// An empty scope with no tags, no span and no local sinks.
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a child carrying `key = value`.
    ///
    /// A key new to the lineage is appended; an existing key keeps its
    /// position and only its value changes.
    pub fn with(&self, key: impl Into<String>, value: impl Into<TagValue>) -> Scope {
        self.with_all([Tag::new(key, value)])
    }

    /// Derive a child applying every tag in turn, as repeated [`Scope::with`] calls would.
    pub fn with_all<T, I>(&self, tags: I) -> Scope
    where
        T: Into<Tag>,
        I: IntoIterator<Item = T>,
    {
        let entries: Vec<Tag> = tags.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            return self.clone();
        }

        let layer = match &self.tags {
            Some(parent) if parent.height >= MAX_LAYER_HEIGHT => {
                let mut flat = self.resolve();
                apply(&mut flat, entries);
                TagLayer { parent: None, entries: flat, height: 1 }
            }
            Some(parent) => TagLayer {
                parent: Some(parent.clone()),
                entries,
                height: parent.height + 1,
            },
            None => TagLayer { parent: None, entries, height: 1 },
        };

        Scope {
            tags: Some(Arc::new(layer)),
            span: self.span.clone(),
            sinks: self.sinks.clone(),
        }
    }

    /// Ordered tags of this lineage, followed by the `meta.instance` sentinel.
    pub fn snapshot(&self) -> Vec<Tag> {
        let mut tags = self.resolve();
        tags.retain(|t| t.key != INSTANCE_TAG);
        tags.push(Tag::new(INSTANCE_TAG, instance_id()));
        tags
    }

    /// Ordered explicit tags, without the sentinel.
    pub fn tags(&self) -> Vec<Tag> {
        self.resolve()
    }

    /// Current value of `key`, if any layer set it.
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        let mut layer = self.tags.as_deref();
        while let Some(l) = layer {
            if let Some(tag) = l.entries.iter().rev().find(|t| t.key == key) {
                return Some(&tag.value);
            }
            layer = l.parent.as_deref();
        }
        None
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn span(&self) -> Option<&SpanContext> {
        self.span.as_deref()
    }

    pub fn span_id(&self) -> Option<SpanId> {
        self.span.as_ref().map(|s| s.id)
    }

    /// Span nesting depth: 0 outside any span, 1 inside a root span.
    pub fn depth(&self) -> u32 {
        self.span.as_ref().map_or(0, |s| s.depth)
    }

    /// Names of the scope-local sinks, outermost first.
    pub fn local_sink_names(&self) -> Vec<String> {
        self.local_sinks().into_iter().map(|(name, _)| name).collect()
    }

    pub(crate) fn enter_span(&self, context: SpanContext) -> Scope {
        Scope {
            tags: self.tags.clone(),
            span: Some(Arc::new(context)),
            sinks: self.sinks.clone(),
        }
    }

    pub(crate) fn with_sink(&self, name: String, sink: Arc<dyn Sink>) -> Scope {
        Scope {
            tags: self.tags.clone(),
            span: self.span.clone(),
            sinks: Some(Arc::new(SinkLayer {
                parent: self.sinks.clone(),
                name,
                sink,
            })),
        }
    }

    pub(crate) fn has_local_sink(&self, name: &str) -> bool {
        let mut layer = self.sinks.as_deref();
        while let Some(l) = layer {
            if l.name == name {
                return true;
            }
            layer = l.parent.as_deref();
        }
        false
    }

    /// Scope-local sinks in registration order.
    pub(crate) fn local_sinks(&self) -> Vec<(String, Arc<dyn Sink>)> {
        let mut out = Vec::new();
        let mut layer = self.sinks.as_deref();
        while let Some(l) = layer {
            out.push((l.name.clone(), l.sink.clone()));
            layer = l.parent.as_deref();
        }
        out.reverse();
        out
    }

    fn resolve(&self) -> Vec<Tag> {
        let mut layers = Vec::new();
        let mut layer = self.tags.as_deref();
        while let Some(l) = layer {
            layers.push(l);
            layer = l.parent.as_deref();
        }

        let mut out: Vec<Tag> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for l in layers.iter().rev() {
            for tag in &l.entries {
                match index.get(tag.key.as_str()) {
                    Some(&i) => out[i].value = tag.value.clone(),
                    None => {
                        index.insert(tag.key.as_str(), out.len());
                        out.push(tag.clone());
                    }
                }
            }
        }
        out
    }
}

/// Fold `entries` into an already-resolved tag list.
fn apply(tags: &mut Vec<Tag>, entries: Vec<Tag>) {
    for tag in entries {
        match tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => tags.push(tag),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("tags", &self.resolve())
            .field("span", &self.span)
            .field("sinks", &self.local_sink_names())
            .finish()
    }
}
