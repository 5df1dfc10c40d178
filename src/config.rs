use std::net::IpAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DNS_ATTEMPTS, DEFAULT_DNS_TIMEOUT_SECS, DEFAULT_NAMESERVERS, MAX_INCLUDE_DEPTH,
};
use crate::error::ConfigError;

/// Settings for one flattening run, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenConfig {
    pub nameservers: Vec<IpAddr>,
    pub timeout: Duration,
    pub attempts: usize,
    pub max_depth: usize,
}

impl FlattenConfig {
    pub fn new(nameservers: Vec<IpAddr>) -> Result<Self, ConfigError> {
        if nameservers.is_empty() {
            return Err(ConfigError::NoNameservers);
        }
        Ok(Self {
            nameservers,
            ..Self::default()
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Result<Self, ConfigError> {
        if attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        self.attempts = attempts;
        Ok(self)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            nameservers: DEFAULT_NAMESERVERS.to_vec(),
            timeout: Duration::from_secs(DEFAULT_DNS_TIMEOUT_SECS),
            attempts: DEFAULT_DNS_ATTEMPTS,
            max_depth: MAX_INCLUDE_DEPTH,
        }
    }
}
