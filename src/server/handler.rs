// src/server/handler.rs
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::health::{HealthCheckResult, ResultStore};
use crate::metrics::CheckMetrics;

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Serves the latest stored result. Reading never triggers a check.
#[derive(Clone)]
pub struct StatusHandler {
    store: ResultStore,
    resource_path: Arc<str>,
    metrics: Option<Arc<CheckMetrics>>,
}

impl StatusHandler {
    pub fn new(store: ResultStore, resource_path: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            resource_path: resource_path.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CheckMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn respond(&self, req: &Request<Body>) -> Response<Body> {
        let path = req.uri().path();

        if let Some(subtree) = self.resource_path.strip_suffix('/') {
            // a subtree resource redirects its bare name, like Go's ServeMux
            if path == subtree {
                let location = match req.uri().query() {
                    Some(query) => format!("{}?{}", self.resource_path, query),
                    None => self.resource_path.to_string(),
                };
                return Response::builder()
                    .status(StatusCode::MOVED_PERMANENTLY)
                    .header(LOCATION, location)
                    .body(Body::empty())
                    .unwrap_or_default();
            }
            if !path.starts_with(&*self.resource_path) {
                return not_found();
            }
        } else if path != &*self.resource_path {
            return not_found();
        }

        let response = render(&self.store.load());
        if let Some(metrics) = &self.metrics {
            metrics.record_status_request(response.status().as_u16());
        }
        response
    }
}

fn not_found() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(CONTENT_TYPE, CONTENT_TYPE_TEXT)
        .body(Body::from("404 page not found\n"))
        .unwrap_or_default()
}

/// 200 for a successful result, 500 otherwise; the body omits the flag.
pub fn render(result: &HealthCheckResult) -> Response<Body> {
    let status = if result.success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = match serde_json::to_vec(result) {
        Ok(mut body) => {
            body.push(b'\n');
            body
        }
        Err(e) => {
            tracing::error!(%e, "failed to encode health check result");
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default();
        }
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .body(Body::from(body))
        .unwrap_or_default()
}

impl Service<Request<Body>> for StatusHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let response = self.respond(&req);
        Box::pin(async move { Ok(response) })
    }
}
