use may_minihttp::{HttpService, Request as RawRequest, Response};
use std::io;
use std::sync::Arc;

use super::request::parse_request;
use super::response::write_response;
use crate::dispatcher::{Dispatcher, HttpResponse};
use crate::middleware::MetricsMiddleware;

/// The `may_minihttp` service: infrastructure endpoints first, then the dispatcher.
#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Option<Arc<MetricsMiddleware>>,
}

impl AppService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            metrics: None,
        }
    }

    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    /// Answer `/health` and `/metrics`; `None` for everything else.
    #[must_use]
    pub fn infrastructure(&self, method: &str, path: &str) -> Option<HttpResponse> {
        if method != "GET" {
            return None;
        }
        match path {
            "/health" => {
                if let Some(m) = &self.metrics {
                    m.inc_top_level_request();
                }
                Some(health_endpoint())
            }
            "/metrics" => {
                let metrics = self.metrics.as_ref()?;
                metrics.inc_top_level_request();
                Some(metrics_endpoint(metrics))
            }
            _ => None,
        }
    }
}

/// Basic health check endpoint returning `{"status":"ok"}`.
#[must_use]
pub fn health_endpoint() -> HttpResponse {
    let mut resp = HttpResponse::new(200);
    resp.set_header("Content-Type", "application/json");
    resp.body = br#"{"status":"ok"}"#.to_vec();
    resp
}

/// Metrics endpoint returning Prometheus text format statistics.
#[must_use]
pub fn metrics_endpoint(metrics: &MetricsMiddleware) -> HttpResponse {
    let mut resp = HttpResponse::new(200);
    resp.set_header("Content-Type", "text/plain; version=0.0.4");
    resp.body = metrics.render().into_bytes();
    resp
}

impl HttpService for AppService {
    fn call(&mut self, req: RawRequest, res: &mut Response) -> io::Result<()> {
        let request = parse_request(&req);
        let resp = match self.infrastructure(request.method.as_str(), request.path()) {
            Some(resp) => resp,
            None => self.dispatcher.dispatch(&request),
        };
        write_response(res, resp);
        Ok(())
    }
}
