//! Configuration for the stub server.
//!
//! Loaded from YAML (or JSON) with [`StubConfig::from_file`]; command-line
//! flags override individual fields afterwards.

use crate::document::{load_contract, load_expectations};
use crate::feature::Feature;
use crate::resolver::Resolver;
use crate::stub::{HttpStub, StubSettings};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default cap on variants produced by combinatorial generation
pub const DEFAULT_MAX_TEST_COMBINATIONS: usize = 64;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StubConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Reject requests that no expectation covers
    #[serde(default)]
    pub strict_mode: bool,

    #[serde(default = "default_max_test_combinations")]
    pub max_test_combinations: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_delay_ms: Option<u64>,

    /// Contract documents
    #[serde(default)]
    pub contracts: Vec<PathBuf>,

    /// Expectation documents registered at startup
    #[serde(default)]
    pub expectations: Vec<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_max_test_combinations() -> usize {
    DEFAULT_MAX_TEST_COMBINATIONS
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            strict_mode: false,
            max_test_combinations: DEFAULT_MAX_TEST_COMBINATIONS,
            default_delay_ms: None,
            contracts: Vec::new(),
            expectations: Vec::new(),
        }
    }
}

impl StubConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: StubConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.host.trim().is_empty() {
            anyhow::bail!("'host' must not be empty");
        }
        if self.max_test_combinations == 0 {
            anyhow::bail!("'maxTestCombinations' must be at least 1");
        }
        Ok(())
    }

    /// Resolve `host:port`; host names such as `localhost` are looked up
    pub fn socket_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("Invalid listen address '{}:{}'", self.host, self.port))
    }

    pub fn settings(&self) -> StubSettings {
        StubSettings {
            strict: self.strict_mode,
            default_delay: self.default_delay_ms.map(Duration::from_millis),
        }
    }

    /// Load every contract, then register every startup expectation
    pub fn build_stub(&self) -> Result<HttpStub, anyhow::Error> {
        let base = Resolver::new().with_max_combinations(self.max_test_combinations);
        let features = self
            .contracts
            .iter()
            .map(|path| {
                let feature = load_contract(path)?;
                info!(
                    contract = %path.display(),
                    scenarios = feature.scenarios.len(),
                    "loaded contract"
                );
                let resolver = base.with_more_patterns(feature.resolver().patterns());
                Ok(feature.with_resolver(resolver))
            })
            .collect::<Result<Vec<Feature>, anyhow::Error>>()?;

        let stub = HttpStub::new(features, self.settings());
        for path in &self.expectations {
            for expectation in load_expectations(path)? {
                stub.register(expectation).map_err(|e| {
                    anyhow::anyhow!("Expectation in {} was rejected: {e}", path.display())
                })?;
            }
        }
        Ok(stub)
    }
}
