use crate::error::Error;
use crate::forward::{ForwardSpec, Upstream};
use crate::rules::{AlternateSpec, RuleTable};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dns_tcp_timeout: Duration,
    /// How long to wait for a single upstream address before trying the next.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub upstream_timeout: Duration,
    /// Overall budget for answering one query, shared by the primary and alternate upstreams.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub request_timeout: Option<Duration>,
    /// The primary upstream, as `FROM TO...`.
    #[serde_as(as = "DisplayFromStr")]
    pub forward: ForwardSpec,
    /// Alternate directives, as `[original] RCODE[,RCODE...] FROM TO...`.
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    pub alternate: Vec<AlternateSpec>,
}

impl Config {
    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] or [`Error::InvalidJSON`] if the file can't be read or parsed, which
    /// includes malformed directives, and [`Error::DuplicateRcode`] if two alternate directives
    /// claim the same response code.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.rule_table()?;
        Ok(conf)
    }

    /// The primary upstream queries go to before any alternate is considered.
    #[must_use]
    pub fn primary_upstream(&self) -> Arc<Upstream> {
        Arc::new(Upstream::new(self.forward.clone(), self.upstream_timeout))
    }

    /// Build the rule table for the configured alternate directives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRcode`] if two directives claim the same response code.
    pub fn rule_table(&self) -> Result<RuleTable, Error> {
        RuleTable::from_specs(self.alternate.iter().cloned(), self.upstream_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use trust_dns_proto::op::ResponseCode;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = config_file(
            r#"{
                "dns_udp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_timeout": 5,
                "upstream_timeout": 2,
                "forward": ". 192.168.1.1:53",
                "alternate": [
                    "original NXDOMAIN . 8.8.8.8",
                    "SERVFAIL,REFUSED . 1.1.1.1:53"
                ]
            }"#,
        );

        let config = Config::try_from_file(file.path()).unwrap();
        assert_eq!(config.upstream_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, None);
        assert_eq!(
            config.primary_upstream().addrs(),
            &["192.168.1.1:53".parse::<SocketAddr>().unwrap()]
        );

        let rules = config.rule_table().unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.any_original());
        let servfail = rules.get(u16::from(ResponseCode::ServFail)).unwrap();
        assert_eq!(
            servfail.upstream().addrs(),
            &["1.1.1.1:53".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn test_invalid_directive_rejected() {
        let file = config_file(
            r#"{
                "dns_udp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_timeout": 5,
                "upstream_timeout": 2,
                "request_timeout": 4,
                "forward": ". 192.168.1.1:53",
                "alternate": ["NODOMAIN . 8.8.8.8"]
            }"#,
        );

        let err = Config::try_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidJSON(_)));
    }

    #[test]
    fn test_duplicate_rcode_rejected() {
        let file = config_file(
            r#"{
                "dns_udp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_bind_addr": "127.0.0.1:5353",
                "dns_tcp_timeout": 5,
                "upstream_timeout": 2,
                "forward": ". 192.168.1.1:53",
                "alternate": ["REFUSED . 192.168.1.1:53", "original REFUSED . 192.168.1.2:53"]
            }"#,
        );

        let err = Config::try_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("specified more than once"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::try_from_file("/nonexistent/alternate.json").unwrap_err();
        assert!(matches!(err, Error::IO(_)));
    }
}
