//! Gandi LiveDNS client for the apex TXT record set.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;

use crate::constants::{GANDI_API_URL, HTTP_TIMEOUT_SECS};
use crate::error::StoreError;
use crate::record::{DomainName, TxtRecordSet};
use crate::store::{parse_record_set, RecordSink, RecordSource, RrsetValues};

pub fn records_url(base_url: &str, domain: &DomainName) -> String {
    format!(
        "{}/domains/{domain}/records/@/TXT",
        base_url.trim_end_matches('/')
    )
}

pub struct GandiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GandiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: GANDI_API_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn authorization(&self) -> String {
        format!("Apikey {}", self.api_key)
    }
}

/// Turns a non-2xx response into `StoreError::Rejected`.
fn check(
    method: &'static str,
    domain: &DomainName,
    response: Response,
) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoreError::Rejected {
        method,
        domain: domain.to_string(),
        status: status.as_u16(),
        body,
    })
}

impl RecordSource for GandiClient {
    fn fetch(&self, domain: &DomainName) -> Result<TxtRecordSet, StoreError> {
        let url = records_url(&self.base_url, domain);
        log::debug!("Calling: GET {url}");
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.authorization())
            .send()?;
        let body = check("GET", domain, response)?.text()?;
        log::debug!("Response: {body}");
        parse_record_set(&body)
    }
}

impl RecordSink for GandiClient {
    fn publish(&self, domain: &DomainName, records: &[String]) -> Result<(), StoreError> {
        let url = records_url(&self.base_url, domain);
        let body = RrsetValues {
            rrset_values: records.to_vec(),
        };
        log::debug!("Calling: PUT {url}");
        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, self.authorization())
            .json(&body)
            .send()?;
        check("PUT", domain, response)?;
        log::info!("Updated TXT records of {domain}");
        Ok(())
    }
}
