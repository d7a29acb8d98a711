use crate::config::SharedConfig;
use crate::dns::handlers::Handler;
use crate::plugin::Handler as ChainStage;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

/// Bind the configured UDP and TCP listeners and serve every request through `chain`.
///
/// # Errors
///
/// Returns an error if either listener can't be bound.
pub async fn new(
    config: SharedConfig,
    chain: Arc<dyn ChainStage>,
) -> anyhow::Result<ServerFuture<Handler>> {
    let socket = UdpSocket::bind(config.dns_udp_bind_addr).await?;
    let listener = TcpListener::bind(config.dns_tcp_bind_addr).await?;
    Ok(with_sockets(
        socket,
        listener,
        config.dns_tcp_timeout,
        chain,
        config.request_timeout,
    ))
}

/// Serve `chain` on sockets that are already bound.
pub fn with_sockets(
    socket: UdpSocket,
    listener: TcpListener,
    tcp_timeout: Duration,
    chain: Arc<dyn ChainStage>,
    request_timeout: Option<Duration>,
) -> ServerFuture<Handler> {
    let mut dns_server = ServerFuture::new(Handler::new(chain, request_timeout));
    dns_server.register_socket(socket);
    dns_server.register_listener(listener, tcp_timeout);
    dns_server
}
