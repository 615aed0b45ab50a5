//! # fedrouter
//!
//! A resource dispatcher for federated content servers. One logical resource (a profile, a
//! post, a feed) is served in many representations to many kinds of caller, across clearnet,
//! onion and i2p identities, behind guards that keep expensive requests from piling up.
//!
//! ## Request Path
//!
//! ```text
//! may_minihttp -> server::AppService -> middleware (before)
//!   -> dispatcher: method, path, route, host, blocklist, accept,
//!      admission (guard / rate limit), authorization, negotiation,
//!      handler or raw document, rewrite, conditional GET
//!   -> middleware (after) -> response
//! ```
//!
//! ## Modules
//!
//! - [`router`] - ordered table of pure route predicates
//! - [`negotiate`] - representation selection
//! - [`security`] - session and signature credentials, route authorization
//! - [`network`] - network identities, URL rewriting, outbound sessions
//! - [`guard`] - singleton guards and the heavy-route rate limiter
//! - [`cache`] - ETag / Last-Modified handling and the asset byte cache
//! - [`dispatcher`] - the stage pipeline and handler contract
//! - [`handlers`] - discovery documents, hashtag feeds, site pages
//! - [`server`] - the HTTP edge

pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod formats;
pub mod guard;
pub mod handlers;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod negotiate;
pub mod network;
pub mod preferences;
pub mod router;
pub mod security;
pub mod server;
pub mod static_files;

pub use config::ServerConfig;
pub use dispatcher::{Dispatcher, HandlerOutput, HandlerRequest, HttpResponse, ResourceHandler};
pub use error::{DispatchError, DispatchResult};
pub use router::{RouteClassifier, RouteId, RouteMatch};
