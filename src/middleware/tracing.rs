use std::time::Duration;

use tracing::{debug, info, warn};

use super::Middleware;
use crate::dispatcher::HttpResponse;
use crate::server::Request;

/// Logs each request on arrival and on completion, keyed by request id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &Request) -> Option<HttpResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path(),
            "request received"
        );
        None
    }

    fn after(&self, req: &Request, res: &mut HttpResponse, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        if res.status >= 500 {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path(),
                status = res.status,
                latency_ms,
                "request completed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path(),
                status = res.status,
                bytes = res.body.len(),
                latency_ms,
                "request completed"
            );
        }
    }
}
