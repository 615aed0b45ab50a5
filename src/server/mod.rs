//! # Server Module
//!
//! The HTTP edge: converts `may_minihttp` requests into [`Request`]s, answers the
//! infrastructure endpoints (`/health`, `/metrics`), hands everything else to the
//! [`Dispatcher`](crate::dispatcher::Dispatcher), and writes the result back.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, parse_request, Request};
pub use response::{status_reason, write_response};
pub use service::{health_endpoint, metrics_endpoint, AppService};
