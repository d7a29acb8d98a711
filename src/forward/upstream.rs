use crate::error::Error;
use crate::plugin::Context;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use trust_dns_client::client::AsyncClient;
use trust_dns_proto::op::Message;
use trust_dns_proto::udp::UdpClientStream;
use trust_dns_proto::xfer::{DnsHandle, DnsRequest, DnsRequestOptions, FirstAnswer};
use trust_dns_server::client::rr::{LowerName, Name};

const DNS_PORT: u16 = 53;
const DNS_SCHEME: &str = "dns";

/// A forwarding target as written in configuration: `FROM TO...`.
///
/// Each `TO` is an IP address (port 53 implied), an `ip:port` pair, either of those prefixed
/// with `dns://`, or the path of a resolv.conf style file whose `nameserver` entries are used.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct ForwardSpec {
    pub from: LowerName,
    pub to: Vec<SocketAddr>,
}

impl ForwardSpec {
    pub(crate) fn from_args<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<Self, Error> {
        let from = parse_zone(args.next().ok_or(Error::MissingArgument("zone"))?)?;
        let mut to = Vec::new();
        for host in args {
            to.extend(parse_host(host)?);
        }
        if to.is_empty() {
            return Err(Error::MissingArgument("upstream address"));
        }
        Ok(ForwardSpec { from, to })
    }
}

impl FromStr for ForwardSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_args(s.split_whitespace())
    }
}

fn parse_zone(zone: &str) -> Result<LowerName, Error> {
    let mut name = Name::from_str(zone).map_err(|_| Error::InvalidZone(zone.to_string()))?;
    name.set_fqdn(true);
    Ok(LowerName::from(name))
}

fn parse_host(host: &str) -> Result<Vec<SocketAddr>, Error> {
    let addr = match host.split_once("://") {
        Some((DNS_SCHEME, rest)) => rest,
        Some((scheme, _)) => return Err(Error::UnsupportedTransport(scheme.to_string())),
        None => host,
    };
    if let Ok(addr) = addr.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, DNS_PORT)]);
    }
    match fs::read_to_string(addr) {
        Ok(contents) => {
            let nameservers = resolv_conf_nameservers(&contents);
            if nameservers.is_empty() {
                return Err(Error::InvalidHost(host.to_string()));
            }
            Ok(nameservers)
        }
        Err(_) => Err(Error::InvalidHost(host.to_string())),
    }
}

fn resolv_conf_nameservers(contents: &str) -> Vec<SocketAddr> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(ip)) => ip.parse::<IpAddr>().ok(),
                _ => None,
            }
        })
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .collect()
}

/// A configured upstream resolver: the zone it answers for, the addresses to try in order and
/// how long to wait for each of them.
///
/// Shared between every rule that names it. Exchanges open a fresh UDP client per attempt.
#[derive(Debug)]
pub struct Upstream {
    from: LowerName,
    addrs: Vec<SocketAddr>,
    timeout: Duration,
    serving: AtomicBool,
}

impl Upstream {
    #[must_use]
    pub fn new(spec: ForwardSpec, timeout: Duration) -> Self {
        Upstream {
            from: spec.from,
            addrs: spec.to,
            timeout,
            serving: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Whether queries for `name` belong to this upstream.
    #[must_use]
    pub fn serves(&self, name: &LowerName) -> bool {
        self.from.zone_of(name)
    }

    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Mark the upstream as ready for exchanges.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other lifecycle hooks.
    pub fn on_startup(&self) -> Result<(), Error> {
        self.serving.store(true, Ordering::Release);
        info!("upstream {self} ready");
        Ok(())
    }

    /// Mark the upstream as closed. Handlers can no longer be built for it.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other lifecycle hooks.
    pub fn on_shutdown(&self) -> Result<(), Error> {
        self.serving.store(false, Ordering::Release);
        info!("upstream {self} closed");
        Ok(())
    }

    /// Send `query` to each address in turn and return the first answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UpstreamUnavailable`] when every address failed or timed out.
    pub async fn exchange(&self, ctx: &Context, query: &Message) -> Result<Message, Error> {
        let mut failed = None;
        for &addr in &self.addrs {
            match self.exchange_with(addr, ctx.deadline, query.clone()).await {
                Ok(mut response) => {
                    let rcode = response.response_code();
                    debug!(upstream = %addr, %rcode, "upstream answered");
                    response.set_id(query.id());
                    return Ok(response);
                }
                Err(err) => {
                    warn!(upstream = %addr, error = %err, "upstream exchange failed");
                    failed = Some(addr);
                }
            }
        }
        match failed {
            Some(addr) => Err(Error::UpstreamUnavailable(addr)),
            None => Err(Error::MissingArgument("upstream address")),
        }
    }

    async fn exchange_with(
        &self,
        addr: SocketAddr,
        deadline: Option<Instant>,
        query: Message,
    ) -> Result<Message, Error> {
        let stream = UdpClientStream::<UdpSocket>::with_timeout(addr, self.timeout);
        let (mut client, background) = AsyncClient::connect(stream).await?;
        let background = tokio::spawn(background);

        let own_deadline = Instant::now() + self.timeout;
        let deadline = deadline.map_or(own_deadline, |d| d.min(own_deadline));
        let request = DnsRequest::new(query, DnsRequestOptions::default());
        let response =
            tokio::time::timeout_at(deadline, client.send(request).first_answer()).await;
        background.abort();

        match response {
            Ok(response) => Ok(response?.into_inner()),
            Err(_) => Err(Error::Timeout(addr)),
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ->", self.from)?;
        for addr in &self.addrs {
            write!(f, " {addr}")?;
        }
        Ok(())
    }
}
