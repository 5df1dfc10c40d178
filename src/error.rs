//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::RecordType;

/// Reasons a name fails DNS syntax checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("DNS name cannot be empty")]
    Empty,

    #[error("DNS name too long (max 253 chars): {0}")]
    TooLong(String),

    #[error("DNS name has empty label: {0}")]
    EmptyLabel(String),

    #[error("DNS label too long (max 63 chars): {0}")]
    LabelTooLong(String),

    #[error("DNS label cannot start/end with hyphen: {0}")]
    Hyphen(String),

    #[error("DNS label has invalid characters: {0}")]
    InvalidChars(String),
}

/// A token or value that could not be turned into a typed SPF element.
///
/// The SPF parser never returns this to a crawl: it degrades the token to
/// `SpfMechanism::Other` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid domain in '{token}': {source}")]
    Domain {
        token: String,
        #[source]
        source: DomainError,
    },

    #[error("invalid network in '{0}'")]
    Network(String),

    #[error("invalid CIDR length in '{0}'")]
    CidrLength(String),

    #[error("unsupported mechanism '{0}'")]
    Unsupported(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionCause {
    #[error("no records found")]
    NotFound,

    #[error("timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// A single DNS lookup failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{record_type} lookup for {domain} failed: {cause}")]
pub struct ResolutionError {
    pub domain: String,
    pub record_type: RecordType,
    pub cause: ResolutionCause,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("at least one nameserver is required")]
    NoNameservers,

    #[error("DNS attempts must be at least 1")]
    NoAttempts,

    #[error("DNS resolver initialization error: {0}")]
    Resolver(#[from] std::io::Error),
}

/// Failures reading or writing a TXT record set at the DNS provider.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected {method} for {domain}: HTTP {status}: {body}")]
    Rejected {
        method: &'static str,
        domain: String,
        status: u16,
        body: String,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record set JSON at '{path}': {message}")]
    Json { path: String, message: String },
}
