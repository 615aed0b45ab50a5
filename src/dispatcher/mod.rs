//! # Dispatcher Module
//!
//! The dispatcher is the heart of fedrouter. It takes a transport-independent
//! [`Request`](crate::server::Request), runs it through a fixed sequence of stages and returns
//! an [`HttpResponse`].
//!
//! ## Overview
//!
//! Each stage either rejects the request with a typed
//! [`DispatchError`](crate::error::DispatchError) or hands a narrower view to the next:
//!
//! ```text
//! method -> path -> classify -> host -> blocklist -> Accept
//!        -> [files: ResponseCache]
//!        -> admission (guard / limiter) -> authorization -> negotiation
//!        -> handler -> raw-document fallback -> rewrite -> ETag / 304
//! ```
//!
//! The order is part of the contract: a blocked crawler asking for a missing page gets 404,
//! not 402, because classification comes first; an unauthenticated caller hitting a busy guard
//! gets 503, because admission comes before authorization.
//!
//! ## Handler Registration
//!
//! ```rust,ignore
//! use fedrouter::dispatcher::{Dispatcher, HandlerOutput, HandlerRequest};
//! use fedrouter::router::RouteId;
//!
//! let mut dispatcher = Dispatcher::new(&config, gate, sessions);
//! dispatcher.register(RouteId::About, |req: &HandlerRequest| {
//!     Some(HandlerOutput::new(format!("<h1>About {}</h1>", req.origin)))
//! });
//! ```
//!
//! A handler that returns `None` declines; the dispatcher then tries the stored raw JSON
//! document for the path before answering 404.
//!
//! ## Error Handling
//!
//! - Handler panics are caught and answered with 503; any singleton guard held for the
//!   request is released by its `Drop` on the way out.
//! - Error bodies are the bare status text; diagnostic codes only appear in logs.
//!
//! ## Concurrency
//!
//! One `Dispatcher` behind an `Arc` serves every connection coroutine. Handlers run on the
//! connection's coroutine; guard and limiter state live in [`DispatchState`] as atomics, so
//! contention is always an immediate 429/503 and never a wait.

mod core;
mod documents;
mod handler;
mod state;

pub use core::{Dispatcher, HttpResponse};
pub use documents::{FsDocumentStore, RawDocumentStore};
pub use handler::{
    HandlerOutput, HandlerRequest, HeaderVec, ResourceHandler, MAX_INLINE_HEADERS,
};
pub use state::DispatchState;
