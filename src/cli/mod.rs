//! # CLI Module
//!
//! Command-line entry points for the `fedrouter` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! ```bash
//! fedrouter serve --config fedrouter.yaml [--watch] [--addr 0.0.0.0:8080]
//! ```
//!
//! Loads the configuration (YAML plus `FEDR_*` overrides), wires the dispatcher with the
//! built-in handlers, tracing and metrics middleware, and serves until SIGTERM or SIGINT.
//! With `--watch` the blocklist is reloaded whenever the configuration file changes.
//!
//! ### `routes`
//!
//! Prints the route table in priority order.
//!
//! ### `classify`
//!
//! ```bash
//! fedrouter classify '/users/alice/statuses/1?page=2'
//! ```
//!
//! Shows the route a path resolves to and the parameters it captures.

mod commands;


pub use commands::{build_dispatcher, classify, print_routes, run_cli, Cli, Commands};
