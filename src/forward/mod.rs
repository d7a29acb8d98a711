//! Forwarding to upstream resolvers.
//!
//! An [`Upstream`] is built once from a [`ForwardSpec`] at startup and shared by every rule or
//! chain stage that names it. A [`Forwarder`] is the [`Handler`][crate::plugin::Handler] that
//! sends a query to an upstream and writes back its answer; [`ForwarderFactory`] builds
//! forwarders on demand for the [alternate layer][crate::fallback].

mod forwarder;
mod upstream;

pub use forwarder::{Forwarder, ForwarderFactory};
pub use upstream::{ForwardSpec, Upstream};
