//! Timed, causally linked units of work.
//!
//! A span is begun from a parent [`Scope`], runs with a derived scope carrying
//! its identity, and emits exactly one [`SpanRecord`] when it ends. The record
//! is emitted on every exit path: normal return, returned error, panic, or a
//! dropped future.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::IdGenerationError;
use crate::ids::SpanId;
use crate::scope::{Scope, SpanContext};
use crate::sink::{Location, Payload, SpanRecord};
use crate::telemetry::Telemetry;
use crate::value::{Tag, TagValue};

/// Tags folded into a span's record when it ends.
///
/// Attached tags never reach the scope the span body runs with, nor its parent.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    tags: Arc<Mutex<Vec<Tag>>>,
}

impl Attachments {
    pub fn attach(&self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.tags.lock().push(Tag::new(key, value));
    }

    pub fn attach_all<T, I>(&self, tags: I)
    where
        T: Into<Tag>,
        I: IntoIterator<Item = T>,
    {
        self.tags.lock().extend(tags.into_iter().map(Into::into));
    }

    fn take(&self) -> Vec<Tag> {
        std::mem::take(&mut *self.tags.lock())
    }
}

/// A span that has begun and not yet emitted.
///
/// Ending it with [`ActiveSpan::end`] or [`ActiveSpan::finish`] emits the
/// record. Dropping it unfinished emits an error record instead.
pub struct ActiveSpan<'t> {
    telemetry: &'t Telemetry,
    context: SpanContext,
    scope: Scope,
    attachments: Attachments,
    started: Instant,
    location: Location,
    finished: bool,
}

impl<'t> ActiveSpan<'t> {
    pub fn id(&self) -> SpanId {
        self.context.id
    }

    /// Scope carrying this span's identity.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn attach(&self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.attachments.attach(key, value);
    }

    /// Emit the record, with severity ERROR if `error` is given.
    pub fn end(mut self, error: Option<&dyn Display>) -> SpanRecord {
        self.emit(error.map(ToString::to_string))
    }

    /// Emit the record for `result`, using its error message if any.
    pub fn finish<T, E: Display>(self, result: &Result<T, E>) -> SpanRecord {
        self.end(result.as_ref().err().map(|e| e as &dyn Display))
    }

    fn emit(&mut self, error: Option<String>) -> SpanRecord {
        self.finished = true;
        let duration = self.started.elapsed();
        let tags = self.scope.with_all(self.attachments.take()).snapshot();

        let record = SpanRecord {
            id: self.context.id,
            parent_id: self.context.parent_id,
            name: self.context.name.clone(),
            depth: self.context.depth,
            start: self.context.start,
            duration,
            error,
            location: Some(self.location),
            tags,
        };
        self.telemetry
            .dispatch(&self.scope, Payload::Span(record.clone()));
        record
    }
}

impl Drop for ActiveSpan<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reason = if std::thread::panicking() {
            "span body panicked"
        } else {
            "span dropped before completion"
        };
        self.emit(Some(reason.to_string()));
    }
}

impl std::fmt::Debug for ActiveSpan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSpan")
            .field("context", &self.context)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Telemetry {
    /// Begin a span under `parent`.
    ///
    /// Depth is the parent's depth plus one, so a root span has depth 1.
    /// Fails without starting anything if no id can be allocated.
    #[track_caller]
    pub fn begin_span(&self, parent: &Scope, name: &str) -> Result<ActiveSpan<'_>, IdGenerationError> {
        let location = Location::from(std::panic::Location::caller());
        let id = SpanId::from(self.ids.next_id()?);
        let context = SpanContext {
            id,
            parent_id: parent.span_id(),
            name: name.to_string(),
            depth: parent.depth() + 1,
            start: Utc::now(),
        };
        Ok(ActiveSpan {
            telemetry: self,
            scope: parent.enter_span(context.clone()),
            context,
            attachments: Attachments::default(),
            started: Instant::now(),
            location,
            finished: false,
        })
    }

    /// Run `body` inside a span and return its result after the span is emitted.
    ///
    /// An id allocation failure is converted into `E` and `body` never runs.
    #[track_caller]
    pub fn run_span<T, E, F>(&self, parent: &Scope, name: &str, body: F) -> Result<T, E>
    where
        E: From<IdGenerationError> + Display,
        F: FnOnce(&Scope, &Attachments) -> Result<T, E>,
    {
        let span = self.begin_span(parent, name)?;
        let result = body(span.scope(), span.attachments());
        span.finish(&result);
        result
    }

    /// Async form of [`Telemetry::run_span`].
    ///
    /// The span begins when this is called, so its duration covers the whole
    /// time until the body's future completes, suspensions included.
    #[track_caller]
    pub fn run_span_async<'a, T, E, F, Fut>(
        &'a self,
        parent: &Scope,
        name: &str,
        body: F,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        T: 'a,
        E: From<IdGenerationError> + Display + 'a,
        F: FnOnce(Scope, Attachments) -> Fut + 'a,
        Fut: Future<Output = Result<T, E>> + 'a,
    {
        let begun = self.begin_span(parent, name);
        async move {
            let span = begun?;
            let result = body(span.scope().clone(), span.attachments().clone()).await;
            span.finish(&result);
            result
        }
    }
}
