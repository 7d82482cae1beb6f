mod common;

use std::fmt::Debug;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// Paths of every root request span opened by the server.
#[derive(Clone, Default)]
struct RequestSpans(Arc<Mutex<Vec<String>>>);

struct TargetVisitor(Option<String>);

impl Visit for TargetVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "http.target" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

impl<S: Subscriber> Layer<S> for RequestSpans {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() != "HTTP request" {
            return;
        }
        let mut visitor = TargetVisitor(None);
        attrs.record(&mut visitor);
        if let Some(target) = visitor.0 {
            self.0.lock().unwrap().push(target);
        }
    }
}

fn request_spans() -> RequestSpans {
    static SPANS: OnceLock<RequestSpans> = OnceLock::new();
    SPANS
        .get_or_init(|| {
            let spans = RequestSpans::default();
            tracing::subscriber::set_global_default(Registry::default().with(spans.clone()))
                .expect("Failed to set subscriber.");
            spans
        })
        .clone()
}

#[tokio::test]
async fn rejected_requests_are_still_logged() {
    let spans = request_spans();
    let app = common::spawn_app().await;

    let response = app
        .client
        .get(app.url("/chat?unauthenticated=1"))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());

    let targets = spans.0.lock().unwrap().clone();
    assert!(
        targets.iter().any(|target| target == "/chat?unauthenticated=1"),
        "no request span for the rejected call: {:?}",
        targets
    );
}
