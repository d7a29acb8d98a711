use alternate::error::Error;
use alternate::rcode::parse_rcode;
use alternate::rules::RuleTableBuilder;
use alternate::{
    CaptureSink, Context, Fallback, Forwarder, ForwarderFactory, Handler, ResponseSink, Rule,
    RuleTable, Upstream,
};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use trust_dns_proto::op::{Edns, Message, MessageType, Query, ResponseCode};
use trust_dns_proto::rr::{Name, RData, Record, RecordType};
use trust_dns_server::server::Protocol;

const TIMEOUT: Duration = Duration::from_millis(500);

/// A UDP DNS server answering every query with `rcode` (and an A record for NOERROR).
struct Responder {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl Responder {
    async fn start(rcode: ResponseCode) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(request.op_code())
                    .set_response_code(rcode);
                response.add_queries(request.queries().to_vec());
                if rcode == ResponseCode::NoError {
                    if let Some(query) = request.queries().first() {
                        response.add_answer(Record::from_rdata(
                            query.name().clone(),
                            60,
                            RData::A(Ipv4Addr::new(127, 0, 0, 1)),
                        ));
                    }
                }
                let _ = socket.send_to(&response.to_vec().unwrap(), src).await;
            }
        });

        Responder { addr, hits }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn upstream(&self) -> Arc<Upstream> {
        Arc::new(Upstream::new(
            format!(". {}", self.addr).parse().unwrap(),
            TIMEOUT,
        ))
    }
}

/// A rewriting downstream stage: attaches EDNS, then writes the query back with `rcode` and
/// reports success, except for SERVFAIL where it writes nothing.
struct StubNext(ResponseCode);

#[async_trait::async_trait]
impl Handler for StubNext {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn serve(
        &self,
        _ctx: &Context,
        sink: &mut dyn ResponseSink,
        query: &mut Message,
    ) -> Result<ResponseCode, Error> {
        let mut edns = Edns::new();
        edns.set_max_payload(4096);
        query.set_edns(edns);
        if self.0 == ResponseCode::ServFail {
            return Ok(ResponseCode::ServFail);
        }
        let mut response = query.clone();
        response.set_response_code(self.0);
        sink.write(response).await?;
        Ok(ResponseCode::NoError)
    }
}

fn query() -> Message {
    let mut message = Message::new();
    message
        .set_id(4242)
        .set_recursion_desired(true)
        .add_query(Query::query(
            Name::from_str("abc.com.").unwrap(),
            RecordType::A,
        ));
    message
}

fn ctx() -> Context {
    Context::new("127.0.0.1:5353".parse().unwrap(), Protocol::Udp)
}

fn rules(entries: &[(&str, &Arc<Upstream>)]) -> RuleTable {
    let mut builder = RuleTableBuilder::default();
    for (rcode, upstream) in entries {
        builder
            .insert(parse_rcode(rcode).unwrap(), Rule::new(Arc::clone(upstream), false))
            .unwrap();
    }
    builder.build()
}

#[tokio::test]
async fn test_alternate_answers_matching_codes() {
    let refused = Responder::start(ResponseCode::Refused).await;
    let target = refused.upstream();

    let cases = [
        ("NXRRSET", ResponseCode::Refused),
        ("SERVFAIL", ResponseCode::Refused),
        // Not in the table, passed through as is.
        ("BADNAME", ResponseCode::BADNAME),
        ("REFUSED", ResponseCode::Refused),
    ];
    for (next_rcode, expected) in cases {
        let fallback = Fallback::new(
            Arc::new(StubNext(parse_rcode(next_rcode).unwrap())),
            rules(&[("NXRRSET", &target), ("SERVFAIL", &target)]),
            Arc::new(ForwarderFactory),
        );

        let mut sink = CaptureSink::new();
        let rcode = fallback.serve(&ctx(), &mut sink, &mut query()).await;

        assert!(
            matches!(rcode, Ok(ResponseCode::NoError)),
            "{next_rcode}: returned {rcode:?}"
        );
        let written = sink.into_message().unwrap();
        assert_eq!(
            u16::from(written.response_code()),
            u16::from(expected),
            "{next_rcode}"
        );
        assert_eq!(written.id(), 4242, "{next_rcode}");
    }
    assert_eq!(refused.hits(), 2);
}

#[tokio::test]
async fn test_primary_refusal_answered_by_alternate() {
    let primary = Responder::start(ResponseCode::Refused).await;
    let secondary = Responder::start(ResponseCode::NoError).await;
    let secondary_upstream = secondary.upstream();

    let fallback = Fallback::new(
        Arc::new(Forwarder::new(primary.upstream())),
        rules(&[("REFUSED", &secondary_upstream)]),
        Arc::new(ForwarderFactory),
    );

    let mut sink = CaptureSink::new();
    let rcode = fallback
        .serve(&ctx(), &mut sink, &mut query())
        .await
        .unwrap();

    assert_eq!(rcode, ResponseCode::NoError);
    let written = sink.into_message().unwrap();
    assert_eq!(written.response_code(), ResponseCode::NoError);
    assert_eq!(written.answers().len(), 1);
    assert_eq!(primary.hits(), 1);
    assert_eq!(secondary.hits(), 1);
}

#[tokio::test]
async fn test_primary_answer_kept_without_rule() {
    let primary = Responder::start(ResponseCode::NXDomain).await;
    let secondary = Responder::start(ResponseCode::NoError).await;
    let secondary_upstream = secondary.upstream();

    let fallback = Fallback::new(
        Arc::new(Forwarder::new(primary.upstream())),
        rules(&[("REFUSED", &secondary_upstream)]),
        Arc::new(ForwarderFactory),
    );

    let mut sink = CaptureSink::new();
    let rcode = fallback
        .serve(&ctx(), &mut sink, &mut query())
        .await
        .unwrap();

    assert_eq!(rcode, ResponseCode::NoError);
    assert_eq!(
        sink.message().map(Message::response_code),
        Some(ResponseCode::NXDomain)
    );
    assert_eq!(secondary.hits(), 0);
}

#[tokio::test]
async fn test_silent_alternate_times_out() {
    // Bound but never read from.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = Arc::new(Upstream::new(
        format!(". {}", silent.local_addr().unwrap()).parse().unwrap(),
        Duration::from_secs(5),
    ));

    let fallback = Fallback::new(
        Arc::new(StubNext(ResponseCode::ServFail)),
        rules(&[("SERVFAIL", &target)]),
        Arc::new(ForwarderFactory),
    );

    let started = Instant::now();
    let ctx = ctx().with_deadline(started + Duration::from_millis(100));
    let mut sink = CaptureSink::new();
    let err = fallback
        .serve(&ctx, &mut sink, &mut query())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable(_)), "{err:?}");
    assert_eq!(err.response_code(), ResponseCode::ServFail);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(sink.message().is_none());
}

#[tokio::test]
async fn test_shut_down_alternate_is_servfail() {
    let refused = Responder::start(ResponseCode::Refused).await;
    let target = refused.upstream();
    let fallback = Fallback::new(
        Arc::new(StubNext(ResponseCode::NXRRSet)),
        rules(&[("NXRRSET", &target)]),
        Arc::new(ForwarderFactory),
    );

    fallback.on_shutdown().await.unwrap();
    let mut sink = CaptureSink::new();
    let err = fallback
        .serve(&ctx(), &mut sink, &mut query())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HandlerConstruction { .. }));
    assert!(sink.message().is_none());
    assert_eq!(refused.hits(), 0);

    fallback.on_startup().await.unwrap();
    let rcode = fallback
        .serve(&ctx(), &mut sink, &mut query())
        .await
        .unwrap();
    assert_eq!(rcode, ResponseCode::NoError);
    assert_eq!(refused.hits(), 1);
}
