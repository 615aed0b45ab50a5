use std::time::Duration;

use crate::dispatcher::HttpResponse;
use crate::server::Request;

/// Hooks around a dispatch.
///
/// `before` may answer the request itself; the first middleware that does wins and the
/// pipeline is skipped. `after` sees every response, including early ones and errors.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &Request) -> Option<HttpResponse> {
        None
    }
    fn after(&self, _req: &Request, _res: &mut HttpResponse, _latency: Duration) {}
}
