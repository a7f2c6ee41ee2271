//! HTTP 请求 span
//!
//! 每个请求一个 `http.request` span；启用 `opentelemetry` 时从 W3C
//! traceparent 头恢复上游上下文。

use axum::http::Request;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{MakeSpan, TraceLayer},
};
use tracing::{Span, info_span};

#[cfg(feature = "opentelemetry")]
use opentelemetry::{Context, propagation::Extractor, trace::TraceContextExt};
#[cfg(feature = "opentelemetry")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub type HttpTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, HttpMakeSpan>;

pub fn http_trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http().make_span_with(HttpMakeSpan)
}

#[derive(Clone, Debug, Default)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let hardware_id = request
            .headers()
            .get(checkin::identity::HARDWARE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let span = info_span!(
            "http.request",
            method = %request.method(),
            uri = %request.uri(),
            hardware_id = %hardware_id,
        );

        #[cfg(feature = "opentelemetry")]
        if let Some(context) = extract_remote_context(request.headers()) {
            let _ = span.set_parent(context);
        }

        span
    }
}

#[cfg(feature = "opentelemetry")]
fn extract_remote_context(headers: &axum::http::HeaderMap) -> Option<Context> {
    struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

    impl Extractor for HeaderExtractor<'_> {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key).and_then(|value| value.to_str().ok())
        }

        fn keys(&self) -> Vec<&str> {
            self.0.keys().map(|name| name.as_str()).collect()
        }
    }

    let context = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(headers))
    });
    if context.span().span_context().is_valid() {
        Some(context)
    } else {
        None
    }
}
