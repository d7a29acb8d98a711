//! Error types.

use std::net::SocketAddr;
use trust_dns_server::client::op::ResponseCode;
use trust_dns_server::client::rr::LowerName;
use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible failure states of the alternate layer, from configuration
/// problems caught at startup to per-request failures.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned at setup when two directives (or two entries of one
    /// [`RuleTableBuilder`][crate::rules::RuleTableBuilder]) claim the same response code.
    #[error("rcode '{0}' is specified more than once")]
    DuplicateRcode(String),

    /// Returned at setup when a directive names a response code that doesn't exist.
    #[error("{0} is not a valid rcode")]
    InvalidRcode(String),

    /// Returned at setup when a directive is missing a required argument.
    #[error("missing argument: expected {0}")]
    MissingArgument(&'static str),

    /// Returned at setup when a forwarding target isn't an address, `host:port` pair or a
    /// readable resolv.conf style file.
    #[error("\"{0}\" is not an IP address or file")]
    InvalidHost(String),

    /// Returned at setup when a forwarding target uses a scheme other than plain `dns://`.
    #[error("only dns transport allowed, got \"{0}\"")]
    UnsupportedTransport(String),

    /// Returned at setup when the zone a target serves can't be parsed as a domain name.
    #[error("invalid zone \"{0}\"")]
    InvalidZone(String),

    /// Returned at request time when the [`HandlerFactory`][crate::fallback::HandlerFactory]
    /// can't build a handler for a matched rule.
    #[error("cannot create alternate handler for {upstream}: {reason}")]
    HandlerConstruction { upstream: String, reason: String },

    /// Returned when a [`Forwarder`][crate::forward::Forwarder] is asked to resolve a name
    /// outside of the zone its upstream serves and has nowhere else to send it.
    #[error("no next handler found for \"{0}\"")]
    NotInZone(LowerName),

    /// Returned when a query has no question section.
    #[error("query has no question")]
    EmptyQuery,

    /// Returned when no upstream address produced an answer in time.
    #[error("no upstream answered (last tried {0})")]
    UpstreamUnavailable(SocketAddr),

    /// Returned when an upstream exchange exceeds its timeout or the request deadline.
    #[error("timed out waiting for {0}")]
    Timeout(SocketAddr),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [loading a `Config`][crate::config::Config::try_from_file] fails due to
    /// invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when a generic DNS protocol error occurs.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}

impl Error {
    /// The response code a request that failed with this error reports to its client.
    #[must_use]
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::ServFail
    }
}
