//! The rule table: which response codes trigger a re-dispatch, and where to.

use crate::error::Error;
use crate::forward::{ForwardSpec, Upstream};
use crate::rcode::{parse_rcodes, rcode_name};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::op::ResponseCode;

const ORIGINAL: &str = "original";

/// One `alternate` directive: `[original] RCODE[,RCODE...] FROM TO...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateSpec {
    pub original: bool,
    pub rcodes: Vec<ResponseCode>,
    pub forward: ForwardSpec,
}

impl FromStr for AlternateSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = s.split_whitespace().peekable();
        let original = args
            .next_if(|arg| arg.eq_ignore_ascii_case(ORIGINAL))
            .is_some();
        let rcodes = parse_rcodes(args.next().ok_or(Error::MissingArgument("rcode"))?)?;
        let forward = ForwardSpec::from_args(args)?;
        Ok(AlternateSpec {
            original,
            rcodes,
            forward,
        })
    }
}

/// What to do for a matched response code.
#[derive(Debug, Clone)]
pub struct Rule {
    use_original: bool,
    upstream: Arc<Upstream>,
}

impl Rule {
    #[must_use]
    pub fn new(upstream: Arc<Upstream>, use_original: bool) -> Self {
        Rule {
            use_original,
            upstream,
        }
    }

    /// Whether the re-dispatch should send the query as it was before the downstream chain
    /// touched it.
    #[must_use]
    pub fn use_original(&self) -> bool {
        self.use_original
    }

    #[must_use]
    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }
}

/// Response code to [`Rule`] mapping. Immutable once built; cheap to share across requests.
#[derive(Debug, Clone, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct RuleTable {
    rules: HashMap<u16, Rule>,
    any_original: bool,
}

impl RuleTable {
    #[must_use]
    pub fn builder() -> RuleTableBuilder {
        RuleTableBuilder::default()
    }

    /// Build a table from parsed directives, creating one shared [`Upstream`] per directive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRcode`] if any response code appears in more than one
    /// directive.
    pub fn from_specs(
        specs: impl IntoIterator<Item = AlternateSpec>,
        upstream_timeout: Duration,
    ) -> Result<Self, Error> {
        let mut builder = Self::builder();
        for spec in specs {
            let upstream = Arc::new(Upstream::new(spec.forward, upstream_timeout));
            for rcode in spec.rcodes {
                builder.insert(rcode, Rule::new(Arc::clone(&upstream), spec.original))?;
            }
        }
        Ok(builder.build())
    }

    #[must_use]
    pub fn get(&self, rcode: u16) -> Option<&Rule> {
        self.rules.get(&rcode)
    }

    /// True when at least one rule wants the original query.
    #[must_use]
    pub fn any_original(&self) -> bool {
        self.any_original
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every distinct upstream named by the table, each listed once.
    #[must_use]
    pub fn upstreams(&self) -> Vec<&Arc<Upstream>> {
        let mut upstreams: Vec<&Arc<Upstream>> = Vec::new();
        for rule in self.rules.values() {
            if !upstreams.iter().any(|seen| Arc::ptr_eq(seen, &rule.upstream)) {
                upstreams.push(&rule.upstream);
            }
        }
        upstreams
    }
}

/// Collects rules at setup time, rejecting duplicate response codes.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct RuleTableBuilder {
    rules: HashMap<u16, Rule>,
}

impl RuleTableBuilder {
    /// Register `rule` for `rcode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRcode`] if a rule for `rcode` was already registered.
    pub fn insert(&mut self, rcode: ResponseCode, rule: Rule) -> Result<&mut Self, Error> {
        let key = u16::from(rcode);
        if self.rules.contains_key(&key) {
            return Err(Error::DuplicateRcode(rcode_name(rcode)));
        }
        self.rules.insert(key, rule);
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> RuleTable {
        let any_original = self.rules.values().any(Rule::use_original);
        RuleTable {
            rules: self.rules,
            any_original,
        }
    }
}
