//! The request pipeline capabilities shared by every stage of the chain.
//!
//! A [`Handler`] receives a query, may answer it by writing to a [`ResponseSink`], and returns
//! the response code of the outcome. A handler that fails hard returns a non-success code
//! without writing anything, leaving the host to answer with an error message.

use crate::error::Error;
use std::net::SocketAddr;
use tokio::time::Instant;
use trust_dns_proto::op::{Message, ResponseCode};
use trust_dns_server::server::Protocol;

/// Per-request context handed unchanged through the chain.
#[derive(Debug, Clone)]
pub struct Context {
    pub src: SocketAddr,
    pub protocol: Protocol,
    /// Point in time after which upstream exchanges for this request should give up.
    pub deadline: Option<Instant>,
}

impl Context {
    #[must_use]
    pub fn new(src: SocketAddr, protocol: Protocol) -> Self {
        Context {
            src,
            protocol,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Where a handler writes its answer.
#[async_trait::async_trait]
pub trait ResponseSink: Send {
    /// Write a response message for the query being served.
    async fn write(&mut self, message: Message) -> Result<(), Error>;
}

/// A stage of the request processing chain.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Serve `query`, writing any answer to `sink`.
    ///
    /// The query may be mutated in place (e.g. to attach EDNS options) before it is passed on.
    async fn serve(
        &self,
        ctx: &Context,
        sink: &mut dyn ResponseSink,
        query: &mut Message,
    ) -> Result<ResponseCode, Error>;

    /// Called once before the server starts accepting queries.
    async fn on_startup(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Called once after the server stops accepting queries.
    async fn on_shutdown(&self) -> Result<(), Error> {
        Ok(())
    }
}
