use crate::error::Error;
use crate::plugin::{Context, Handler as ChainStage, ResponseSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, warn};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, Message, MessageType, ResponseCode};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

/// Serves DNS requests by running them through a chain of [`ChainStage`]s.
#[derive(Clone)]
pub struct Handler {
    chain: Arc<dyn ChainStage>,
    request_timeout: Option<Duration>,
}

impl Handler {
    pub(super) fn new(chain: Arc<dyn ChainStage>, request_timeout: Option<Duration>) -> Self {
        Handler {
            chain,
            request_timeout,
        }
    }

    fn context(&self, request: &Request) -> Context {
        let ctx = Context::new(request.src(), request.protocol());
        match self.request_timeout {
            Some(timeout) => ctx.with_deadline(Instant::now() + timeout),
            None => ctx,
        }
    }
}

/// The query message the chain works on, rebuilt from the wire request.
fn query_message(request: &Request) -> Message {
    let mut message = Message::new();
    message.set_header(request.header().clone());
    message.add_query(request.query().original().clone());
    if let Some(edns) = request.edns() {
        message.set_edns(edns.clone());
    }
    message
}

fn serve_failed() -> ResponseInfo {
    let mut header = Header::new();
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}

/// Answers the client through the server's [`ResponseHandler`].
struct ResponseHandleSink<'q, R> {
    request: &'q Request,
    response_handle: R,
    info: Option<ResponseInfo>,
}

impl<'q, R: ResponseHandler> ResponseHandleSink<'q, R> {
    fn new(request: &'q Request, response_handle: R) -> Self {
        ResponseHandleSink {
            request,
            response_handle,
            info: None,
        }
    }

    async fn send_error(&mut self, response_code: ResponseCode) -> ResponseInfo {
        let response = MessageResponseBuilder::from_message_request(self.request);
        match self
            .response_handle
            .send_response(response.error_msg(self.request.header(), response_code))
            .await
        {
            Ok(info) => info,
            Err(err) => {
                error!("error sending response: {err}");
                serve_failed()
            }
        }
    }
}

#[async_trait::async_trait]
impl<'q, R: ResponseHandler> ResponseSink for ResponseHandleSink<'q, R> {
    async fn write(&mut self, message: Message) -> Result<(), Error> {
        let mut header = message.header().clone();
        header.set_id(self.request.id());
        header.set_message_type(MessageType::Response);

        let mut builder = MessageResponseBuilder::from_message_request(self.request);
        if let Some(edns) = message.extensions() {
            builder.edns(edns.clone());
        }
        let response = builder.build(
            header,
            message.answers(),
            message.name_servers(),
            &[],
            message.additionals(),
        );
        self.info = Some(self.response_handle.send_response(response).await?);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        let ctx = self.context(request);
        let mut query = query_message(request);
        let mut sink = ResponseHandleSink::new(request, response_handle);

        let result = self.chain.serve(&ctx, &mut sink, &mut query).await;
        match (sink.info.take(), result) {
            (Some(info), Ok(_)) => info,
            (Some(info), Err(err)) => {
                warn!("error after response was sent by {}: {err}", self.chain.name());
                info
            }
            (None, Ok(ResponseCode::NoError)) => {
                warn!("{} returned success without a response", self.chain.name());
                sink.send_error(ResponseCode::ServFail).await
            }
            (None, Ok(response_code)) => sink.send_error(response_code).await,
            (None, Err(err)) => {
                error!("error in {}: {err}", self.chain.name());
                sink.send_error(err.response_code()).await
            }
        }
    }
}
