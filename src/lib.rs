//! Alternate
//!
//! A response code driven failover layer for a DNS forwarding chain. When the chain answers a
//! query with one of a configured set of response codes (SERVFAIL, REFUSED, NXDOMAIN, ...), the
//! answer is held back and the query is asked again of an alternate upstream resolver,
//! optionally in the form it had before any earlier stage rewrote it.
//!
//! The pieces:
//!
//! * [`plugin`]: the [`Handler`] and [`ResponseSink`] capabilities every chain stage shares.
//! * [`capture`]: the sink that records a downstream answer without sending it.
//! * [`rules`]: the response code to upstream [`RuleTable`], built once at startup.
//! * [`fallback`]: the [`Fallback`] stage deciding between pass-through and re-dispatch.
//! * [`forward`]: upstream resolvers and the [`Forwarder`] stage talking to them.
//! * [`dns`]: the UDP/TCP server hosting a chain.
//!
#![warn(clippy::pedantic)]

pub mod capture;
pub mod config;
pub mod dns;
pub mod error;
pub mod fallback;
pub mod forward;
pub mod plugin;
pub mod rcode;
pub mod rules;

pub use capture::CaptureSink;
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use fallback::{Fallback, HandlerFactory};
pub use forward::{Forwarder, ForwarderFactory, Upstream};
pub use plugin::{Context, Handler, ResponseSink};
pub use rules::{Rule, RuleTable};
