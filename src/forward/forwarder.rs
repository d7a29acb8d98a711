use crate::error::Error;
use crate::fallback::HandlerFactory;
use crate::forward::Upstream;
use crate::plugin::{Context, Handler, ResponseSink};
use std::sync::Arc;
use tracing::{debug, Instrument, Span};
use trust_dns_proto::op::{Message, ResponseCode};
use trust_dns_server::client::rr::LowerName;

/// Forwards every query inside its upstream's zone and writes the first answer back.
pub struct Forwarder {
    upstream: Arc<Upstream>,
    span: Span,
}

impl Forwarder {
    #[must_use]
    pub fn new(upstream: Arc<Upstream>) -> Self {
        Forwarder {
            upstream,
            span: Span::none(),
        }
    }

    /// Run exchanges inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }
}

#[async_trait::async_trait]
impl Handler for Forwarder {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn serve(
        &self,
        ctx: &Context,
        sink: &mut dyn ResponseSink,
        query: &mut Message,
    ) -> Result<ResponseCode, Error> {
        let name = query
            .queries()
            .first()
            .map(|q| LowerName::from(q.name()))
            .ok_or(Error::EmptyQuery)?;
        if !self.upstream.serves(&name) {
            return Err(Error::NotInZone(name));
        }

        debug!(parent: &self.span, %name, "forwarding to {}", self.upstream);
        let response = self
            .upstream
            .exchange(ctx, query)
            .instrument(self.span.clone())
            .await?;
        sink.write(response).await?;
        Ok(ResponseCode::NoError)
    }

    async fn on_startup(&self) -> Result<(), Error> {
        self.upstream.on_startup()
    }

    async fn on_shutdown(&self) -> Result<(), Error> {
        self.upstream.on_shutdown()
    }
}

/// Builds a [`Forwarder`] per re-dispatch. Refuses to build for an upstream that has been
/// shut down.
#[derive(Debug, Default, Clone, Copy)]
#[allow(clippy::module_name_repetitions)]
pub struct ForwarderFactory;

impl HandlerFactory for ForwarderFactory {
    fn build(&self, span: Span, upstream: &Arc<Upstream>) -> Result<Box<dyn Handler>, Error> {
        if !upstream.is_serving() {
            return Err(Error::HandlerConstruction {
                upstream: upstream.to_string(),
                reason: "upstream is shut down".to_string(),
            });
        }
        Ok(Box::new(Forwarder::new(Arc::clone(upstream)).with_span(span)))
    }
}
