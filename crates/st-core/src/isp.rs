//! ISP enrichment.
//!
//! Looks up autonomous-system / organization / country data for a public
//! address. Lookups are best-effort: one attempt, bounded by a timeout, no
//! retry, no cache. Every failure collapses into
//! [`LookupOutcome::Unavailable`] so callers never have to handle an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Label used when the lookup yields no organization.
pub const UNKNOWN_ISP: &str = "Unknown ISP";

/// Lookup service response. Every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentResult {
    pub ip: String,
    pub asn: String,
    pub domain: String,
    /// Organization, often prefixed with the AS number (`AS64500 Example`).
    pub isp: String,
    pub continent_code: String,
    pub continent_name: String,
    pub country_code: String,
    pub country_name: String,
    pub user_agent: String,
}

impl EnrichmentResult {
    pub fn is_empty(&self) -> bool {
        *self == EnrichmentResult::default()
    }
}

/// Result of one lookup attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(EnrichmentResult),
    Unavailable(String),
}

impl LookupOutcome {
    /// The enrichment data, or an empty result when the lookup failed.
    pub fn into_result(self) -> EnrichmentResult {
        match self {
            LookupOutcome::Found(result) => result,
            LookupOutcome::Unavailable(_) => EnrichmentResult::default(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }
}

/// ISP lookup provider interface.
pub trait IspLookup: Send + Sync {
    /// Provider name used for logs.
    fn name(&self) -> &str;
    /// Look up `address`. Must not panic and must not block indefinitely.
    fn lookup(&self, address: &str) -> LookupOutcome;
}

/// Lookup provider that never calls out; used when enrichment is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIspLookup;

impl IspLookup for NoopIspLookup {
    fn name(&self) -> &str {
        "noop"
    }

    fn lookup(&self, _address: &str) -> LookupOutcome {
        LookupOutcome::Unavailable("enrichment disabled".to_string())
    }
}

/// Lookup provider backed by an HTTP JSON endpoint (`GET <url>?ip=<address>`).
#[derive(Debug, Clone)]
pub struct HttpIspLookup {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpIspLookup {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("st-core/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl IspLookup for HttpIspLookup {
    fn name(&self) -> &str {
        "http"
    }

    fn lookup(&self, address: &str) -> LookupOutcome {
        if address.is_empty() {
            warn!("no IP address provided for lookup");
            return LookupOutcome::Unavailable("empty address".to_string());
        }

        let response = match self.agent.get(&self.endpoint).query("ip", address).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                warn!(status = code, address, "ISP lookup returned error status");
                return LookupOutcome::Unavailable(format!("status {code}"));
            }
            Err(e) => {
                warn!(error = %e, address, "ISP lookup request failed");
                return LookupOutcome::Unavailable(e.to_string());
            }
        };

        match response.into_json::<EnrichmentResult>() {
            Ok(result) => {
                debug!(address, isp = %result.isp, country = %result.country_name, "got ISP info");
                LookupOutcome::Found(result)
            }
            Err(e) => {
                warn!(error = %e, address, "failed to parse ISP lookup response");
                LookupOutcome::Unavailable(format!("decode: {e}"))
            }
        }
    }
}

fn as_prefix() -> &'static Regex {
    static AS_PREFIX: OnceLock<Regex> = OnceLock::new();
    AS_PREFIX.get_or_init(|| Regex::new(r"AS\d+\s").expect("AS prefix pattern is valid"))
}

/// Display label for an enrichment result: `"<org>[, <country>]"`.
///
/// AS-number tokens are removed from the organization; an empty
/// organization becomes [`UNKNOWN_ISP`].
pub fn isp_label(result: &EnrichmentResult) -> String {
    let org = as_prefix().replace_all(&result.isp, "");
    let mut label = if org.is_empty() {
        UNKNOWN_ISP.to_string()
    } else {
        org.into_owned()
    };
    if !result.country_name.is_empty() {
        label.push_str(", ");
        label.push_str(&result.country_name);
    }
    label
}
