//! Where TXT record sets are read from and written to.

pub mod file;
pub mod gandi;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::reconciler::{changed, reconcile};
use crate::record::{DomainName, TxtRecordSet};

/// JSON shape shared by the LiveDNS API and the `--load` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RrsetValues {
    pub rrset_values: TxtRecordSet,
}

/// Parses `{"rrset_values": [...]}`, naming the offending path on error.
pub fn parse_record_set(raw: &str) -> Result<TxtRecordSet, StoreError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let parsed: RrsetValues =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|e| StoreError::Json {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
    Ok(parsed.rrset_values)
}

pub trait RecordSource {
    fn fetch(&self, domain: &DomainName) -> Result<TxtRecordSet, StoreError>;
}

/// Replaces the whole TXT set of a domain in one call.
pub trait RecordSink {
    fn publish(&self, domain: &DomainName, records: &[String]) -> Result<(), StoreError>;
}

/// Reads the TXT set of `domain`, puts `spf_record` in place of its SPF
/// record and publishes the result if anything changed. Returns whether a
/// publish happened.
pub fn sync_domain<S, K>(
    source: &S,
    sink: &K,
    domain: &DomainName,
    spf_record: &str,
) -> Result<bool, StoreError>
where
    S: RecordSource + ?Sized,
    K: RecordSink + ?Sized,
{
    let existing = source.fetch(domain)?;
    let result = reconcile(&existing, spf_record);
    log::debug!("Old records: {:?}", result.old_normalized);
    log::debug!("New records: {:?}", result.new);

    if !changed(&result.new, &result.old_normalized) {
        log::info!("{domain}: no change");
        return Ok(false);
    }
    log::info!("{domain}: SPF record changed, publishing");
    sink.publish(domain, &result.new)?;
    Ok(true)
}

/// Logs the request a publish would send instead of sending it.
pub struct DryRun {
    base_url: String,
}

impl DryRun {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl RecordSink for DryRun {
    fn publish(&self, domain: &DomainName, records: &[String]) -> Result<(), StoreError> {
        let body = RrsetValues {
            rrset_values: records.to_vec(),
        };
        let body = serde_json::to_string(&body).map_err(|e| StoreError::Json {
            path: ".".to_string(),
            message: e.to_string(),
        })?;
        log::info!("Calling: PUT {}", gandi::records_url(&self.base_url, domain));
        log::info!("With headers: Authorization: Apikey <redacted>");
        log::info!("And body: {body}");
        Ok(())
    }
}
