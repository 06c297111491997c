//! Tracing layer that forwards warnings and errors to the diagnostics pane.
//!
//! Failures the view-model swallows are logged with `warn!`; this layer lets
//! the terminal UI show them without the view contract changing.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// One line in the diagnostics pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Sends WARN and ERROR events to a channel.
pub struct DiagnosticsLayer {
    sender: mpsc::UnboundedSender<Diagnostic>,
}

impl DiagnosticsLayer {
    pub fn new(sender: mpsc::UnboundedSender<Diagnostic>) -> Self {
        Self { sender }
    }
}

impl<S> Layer<S> for DiagnosticsLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        // Level ordering is by verbosity: WARN > ERROR.
        if level > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        // The pane may already be gone during shutdown
        let _ = self.sender.send(Diagnostic {
            level,
            target: event.metadata().target().to_string(),
            message: visitor.message,
            timestamp: Utc::now(),
        });
    }
}

/// Collects the `message` field, appending any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl MessageVisitor {
    fn push(&mut self, name: &str, value: String) {
        if name == "message" {
            if self.message.is_empty() {
                self.message = value;
            } else {
                self.message = format!("{} {}", value, self.message);
            }
        } else {
            if !self.message.is_empty() {
                self.message.push(' ');
            }
            self.message.push_str(&format!("{}={}", name, value));
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field.name(), format!("{:?}", value));
    }
}
