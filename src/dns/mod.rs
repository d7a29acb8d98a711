//! The DNS server hosting the handler chain.
//!
//! Requests arriving over UDP or TCP are turned into a query
//! [`Message`][trust_dns_proto::op::Message] and run through the configured chain. Whatever the
//! chain writes is sent back to the client. When the chain writes nothing the client gets an
//! error response carrying the code the chain returned, or SERVFAIL if it failed.
//!
//! With the config:
//! ```json
//! {
//!   "forward": ". 192.168.1.1:53",
//!   "alternate": [ "SERVFAIL,REFUSED . 8.8.8.8" ],
//!   ...
//! }
//! ```
//!
//! A query that `192.168.1.1` refuses is asked again of `8.8.8.8`, and the client only ever sees
//! the second answer:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 +short example.org A
//! 93.184.216.34
//! ```

mod handlers;
pub mod server;

pub use handlers::Handler;
pub use server::new;
