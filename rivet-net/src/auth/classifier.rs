// rivet-net/src/auth/classifier.rs
//! Proxy-vs-origin classification of authentication challenges.
//!
//! Strategies are probed once, when the bridge is installed, and the
//! supported ones are consulted in priority order for every challenge.

use std::fmt;

use rivet_common::config::ProxySettings;
use tracing::debug;

use super::challenge::{AuthenticationChallenge, RequestorType};

pub trait ChallengeClassifier: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether the environment gives this strategy anything to work with.
    fn is_supported(&self) -> bool;

    fn classify(&self, challenge: &AuthenticationChallenge) -> Option<RequestorType>;
}

/// Uses the requestor type reported by the transport.
#[derive(Debug, Default)]
pub struct RequestorTypeClassifier;

impl ChallengeClassifier for RequestorTypeClassifier {
    fn name(&self) -> &'static str {
        "requestor-type"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn classify(&self, challenge: &AuthenticationChallenge) -> Option<RequestorType> {
        challenge.requestor_type
    }
}

/// Compares the challenging host against the configured proxy host.
#[derive(Debug, Default)]
pub struct ProxyHostClassifier {
    proxy_host: Option<String>,
}

impl ProxyHostClassifier {
    pub fn new(proxy_host: Option<String>) -> Self {
        Self { proxy_host }
    }
}

impl ChallengeClassifier for ProxyHostClassifier {
    fn name(&self) -> &'static str {
        "proxy-host"
    }

    fn is_supported(&self) -> bool {
        self.proxy_host.is_some()
    }

    fn classify(&self, challenge: &AuthenticationChallenge) -> Option<RequestorType> {
        let proxy_host = self.proxy_host.as_deref()?;
        if challenge.host == proxy_host {
            Some(RequestorType::Proxy)
        } else {
            Some(RequestorType::Server)
        }
    }
}

#[derive(Debug)]
pub struct ClassifierChain {
    strategies: Vec<Box<dyn ChallengeClassifier>>,
}

impl ClassifierChain {
    /// Keeps the supported strategies, in the order given.
    pub fn new(candidates: Vec<Box<dyn ChallengeClassifier>>) -> Self {
        let strategies: Vec<Box<dyn ChallengeClassifier>> = candidates
            .into_iter()
            .filter(|s| {
                let supported = s.is_supported();
                debug!(
                    "Challenge classifier '{}' supported: {}",
                    s.name(),
                    supported
                );
                supported
            })
            .collect();
        Self { strategies }
    }

    /// Default priority: explicit requestor type, then proxy host comparison.
    pub fn detect(proxy: &ProxySettings) -> Self {
        Self::new(vec![
            Box::new(RequestorTypeClassifier),
            Box::new(ProxyHostClassifier::new(proxy.host.clone())),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Challenges no strategy can place are treated as origin-directed.
    pub fn classify(&self, challenge: &AuthenticationChallenge) -> RequestorType {
        self.strategies
            .iter()
            .find_map(|s| s.classify(challenge))
            .unwrap_or(RequestorType::Server)
    }

    pub fn is_proxy_authentication(&self, challenge: &AuthenticationChallenge) -> bool {
        self.classify(challenge) == RequestorType::Proxy
    }
}
