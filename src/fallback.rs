//! Response code driven failover.
//!
//! [`Fallback`] sits in front of a downstream [`Handler`]. The downstream answer is held back in a
//! [`CaptureSink`] and its response code looked up in a [`RuleTable`]:
//!
//! * no rule: the held back answer is released to the client untouched, together with the
//!   downstream result.
//! * a rule: the answer is dropped and the query is sent once to the rule's upstream through a
//!   handler built by the [`HandlerFactory`]. Whatever that handler writes and returns is the
//!   final outcome. A downstream error is superseded by the re-dispatch.
//!
//! With a rule marked `original`, the query is cloned before the downstream chain can rewrite
//! it and the clone is what gets re-dispatched.

use crate::capture::CaptureSink;
use crate::error::Error;
use crate::forward::Upstream;
use crate::plugin::{Context, Handler, ResponseSink};
use crate::rcode::rcode_name;
use crate::rules::RuleTable;
use std::sync::Arc;
use tracing::{debug, info_span, Span};
use trust_dns_proto::op::{Message, ResponseCode};

/// Builds the one-shot handler used to re-dispatch a query to an upstream.
pub trait HandlerFactory: Send + Sync {
    /// Build a handler bound to `upstream`, running inside `span`.
    ///
    /// # Errors
    ///
    /// Returns an error when no handler can be built; the request is then answered with
    /// SERVFAIL.
    fn build(&self, span: Span, upstream: &Arc<Upstream>) -> Result<Box<dyn Handler>, Error>;
}

/// The code a downstream outcome is filed under: the answer's own response code when an answer
/// was written, the returned code otherwise.
///
/// Forwarding handlers report success even when the answer they wrote carries NXDOMAIN or
/// REFUSED, so the written message is the better signal whenever there is one.
#[must_use]
pub fn lookup_code(returned: ResponseCode, captured: Option<ResponseCode>) -> u16 {
    u16::from(captured.unwrap_or(returned))
}

pub struct Fallback {
    next: Arc<dyn Handler>,
    rules: RuleTable,
    factory: Arc<dyn HandlerFactory>,
}

impl Fallback {
    #[must_use]
    pub fn new(next: Arc<dyn Handler>, rules: RuleTable, factory: Arc<dyn HandlerFactory>) -> Self {
        Fallback {
            next,
            rules,
            factory,
        }
    }
}

#[async_trait::async_trait]
impl Handler for Fallback {
    fn name(&self) -> &'static str {
        "alternate"
    }

    async fn serve(
        &self,
        ctx: &Context,
        sink: &mut dyn ResponseSink,
        query: &mut Message,
    ) -> Result<ResponseCode, Error> {
        // Taken before the downstream chain gets a chance to rewrite the query.
        let mut original = self.rules.any_original().then(|| query.clone());

        let mut capture = CaptureSink::new();
        let result = self.next.serve(ctx, &mut capture, query).await;

        let returned = match &result {
            Ok(rcode) => *rcode,
            Err(err) => err.response_code(),
        };
        let code = lookup_code(returned, capture.message().map(Message::response_code));

        let Some(rule) = self.rules.get(code) else {
            if let Some(message) = capture.into_message() {
                sink.write(message).await?;
            }
            return result;
        };

        let rcode = rcode_name(code.into());
        if let Err(err) = &result {
            debug!(%rcode, error = %err, "downstream error superseded by alternate");
        }
        let span = info_span!("alternate", %rcode, upstream = %rule.upstream());
        let handler = self.factory.build(span, rule.upstream())?;

        let query = match original.as_mut() {
            Some(original) if rule.use_original() => original,
            _ => query,
        };
        debug!(
            %rcode,
            original = rule.use_original(),
            "re-dispatching to {}",
            rule.upstream()
        );
        handler.serve(ctx, sink, query).await
    }

    async fn on_startup(&self) -> Result<(), Error> {
        for upstream in self.rules.upstreams() {
            upstream.on_startup()?;
        }
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), Error> {
        for upstream in self.rules.upstreams() {
            upstream.on_shutdown()?;
        }
        Ok(())
    }
}
