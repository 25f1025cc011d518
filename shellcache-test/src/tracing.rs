//! Span capture for asserting on coordinator activity.
//!
//! Only spans whose target starts with `shellcache` are kept, so spans of
//! the test harness itself never show up in assertions.

use std::sync::{Arc, Mutex};

use tracing::Dispatch;
use tracing::span::{Attributes, Id, Record};
use tracing::{Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

/// A span seen by the collector.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub name: String,
    pub target: String,
    /// Field values rendered as strings.
    pub fields: Vec<(String, String)>,
}

struct SpanCaptureLayer {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
}

#[derive(Default)]
struct FieldVisitor {
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.fields
            .push((field.name().to_string(), format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }
}

fn is_captured(metadata: &Metadata<'_>) -> bool {
    metadata.target().starts_with("shellcache")
}

impl<S> Layer<S> for SpanCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let metadata = attrs.metadata();
        if !is_captured(metadata) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        let parent_id = attrs
            .parent()
            .cloned()
            .or_else(|| {
                if attrs.is_contextual() {
                    ctx.current_span().id().cloned()
                } else {
                    None
                }
            })
            .map(|id| id.into_u64());

        self.spans.lock().unwrap().push(CapturedSpan {
            id: id.into_u64(),
            parent_id,
            name: metadata.name().to_string(),
            target: metadata.target().to_string(),
            fields: visitor.fields,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span_ref) = ctx.span(id) else {
            return;
        };
        if !is_captured(span_ref.metadata()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let span_id = id.into_u64();
        let mut spans = self.spans.lock().unwrap();
        if let Some(captured) = spans.iter_mut().find(|s| s.id == span_id) {
            for (key, value) in visitor.fields {
                if let Some(existing) = captured.fields.iter_mut().find(|(k, _)| k == &key) {
                    existing.1 = value;
                } else {
                    captured.fields.push((key, value));
                }
            }
        }
    }
}

/// Collects spans through its own [`Dispatch`].
///
/// Futures must be run under [`SpanCollector::dispatch`] (for example with
/// `WithSubscriber::with_subscriber`) for their spans to be captured. Tasks
/// spawned onto the runtime do not inherit it.
#[derive(Clone)]
pub struct SpanCollector {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    dispatch: Dispatch,
}

impl SpanCollector {
    /// Creates a collector with nothing captured.
    pub fn new() -> Self {
        let spans = Arc::new(Mutex::new(Vec::new()));
        let layer = SpanCaptureLayer {
            spans: spans.clone(),
        };
        let dispatch = Dispatch::new(Registry::default().with(layer));
        Self { spans, dispatch }
    }

    /// The dispatcher futures must run under to be captured.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Every captured span in creation order.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    /// Names of the captured spans in creation order.
    pub fn span_names(&self) -> Vec<String> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Whether any span named `name` was captured.
    pub fn has_span(&self, name: &str) -> bool {
        self.spans.lock().unwrap().iter().any(|s| s.name == name)
    }

    /// The last span captured under `name`.
    pub fn get_span(&self, name: &str) -> Option<CapturedSpan> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Rendered value of `field_name` on the last span named `span_name`.
    /// Values recorded after creation replace the initial ones.
    pub fn get_field(&self, span_name: &str, field_name: &str) -> Option<String> {
        self.get_span(span_name).and_then(|s| {
            s.fields
                .iter()
                .find(|(k, _)| k == field_name)
                .map(|(_, v)| v.clone())
        })
    }

    /// Forgets everything captured so far, so later assertions only see
    /// spans of the steps that follow.
    pub fn clear(&self) {
        self.spans.lock().unwrap().clear();
    }

    /// Checks that `expected` appear in this order, other spans allowed in
    /// between.
    pub fn assert_span_sequence(&self, expected: &[&str]) {
        let names = self.span_names();
        let mut expected_iter = expected.iter();
        let mut current_expected = expected_iter.next();

        for name in &names {
            if let Some(exp) = current_expected
                && name == *exp
            {
                current_expected = expected_iter.next();
            }
        }

        if current_expected.is_some() {
            panic!("Expected span sequence {:?} but got {:?}", expected, names);
        }
    }
}

impl Default for SpanCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{Level, span};

    fn capture(f: impl FnOnce()) -> SpanCollector {
        let collector = SpanCollector::new();
        tracing::dispatcher::with_default(collector.dispatch(), f);
        collector
    }

    #[test]
    fn test_span_capture() {
        let collector = capture(|| {
            let span = span!(target: "shellcache::install", Level::INFO, "install", generation = "v1");
            let _enter = span.enter();
        });

        assert!(collector.has_span("install"));
        assert_eq!(
            collector.get_field("install", "generation"),
            Some("v1".to_string())
        );
    }

    #[test]
    fn test_foreign_targets_are_ignored() {
        let collector = capture(|| {
            let span = span!(target: "hyper::proto", Level::INFO, "install");
            let _enter = span.enter();
        });

        assert!(!collector.has_span("install"));
    }

    #[test]
    fn test_span_sequence() {
        let collector = capture(|| {
            for label in ["install", "sweep"] {
                let span = span!(target: "shellcache", Level::INFO, "step", label);
                let _enter = span.enter();
            }
            let span = span!(target: "shellcache::sweep", Level::INFO, "sweep");
            let _enter = span.enter();
        });

        assert_eq!(collector.spans().len(), 3);
        collector.assert_span_sequence(&["step", "sweep"]);
    }

    #[test]
    fn test_clear_forgets_earlier_spans() {
        let collector = SpanCollector::new();
        tracing::dispatcher::with_default(collector.dispatch(), || {
            let span = span!(target: "shellcache::install", Level::INFO, "install");
            let _enter = span.enter();
        });
        collector.clear();
        assert!(collector.spans().is_empty());

        tracing::dispatcher::with_default(collector.dispatch(), || {
            let span = span!(target: "shellcache::sweep", Level::INFO, "sweep", store = "memory");
            let _enter = span.enter();
        });
        assert_eq!(collector.span_names(), vec!["sweep"]);
        assert_eq!(collector.get_field("sweep", "store"), Some("memory".to_string()));
    }
}
