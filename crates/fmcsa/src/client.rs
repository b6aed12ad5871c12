use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::warn;

use loadline_core::{CarrierInfo, CarrierRegistry, LookupFailure, McNumber};

/// FMCSA QCMobile carrier lookup over HTTP.
pub struct FmcsaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl FmcsaClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;

        Ok(Self { http, base_url: trim_trailing_slash(base_url.into()), api_key })
    }
}

#[async_trait]
impl CarrierRegistry for FmcsaClient {
    async fn verify(&self, mc: &McNumber) -> Result<Option<CarrierInfo>, LookupFailure> {
        let url = format!("{}/{}", self.base_url, mc.as_str());

        let mut request = self.http.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| LookupFailure(format!("fmcsa request failed: {error}")))?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response
                    .json()
                    .await
                    .map_err(|error| LookupFailure(format!("fmcsa response unreadable: {error}")))?;
                Ok(parse_carrier(&body, mc))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                warn!(
                    event_name = "fmcsa.unexpected_status",
                    mc_number = %mc,
                    status = status.as_u16(),
                    "fmcsa lookup returned an unexpected status"
                );
                Err(LookupFailure(format!("fmcsa returned status {status}")))
            }
        }
    }
}

/// Map the QCMobile `content` envelope onto a carrier record. Unknown or
/// empty envelopes resolve to "not found" rather than an error.
pub(crate) fn parse_carrier(body: &Value, mc: &McNumber) -> Option<CarrierInfo> {
    let content = body.get("content")?;
    let record = match content {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let legal_name = record.get("legalName").and_then(Value::as_str)?.to_string();
    if legal_name.is_empty() {
        return None;
    }

    Some(CarrierInfo {
        mc_number: mc.clone(),
        legal_name,
        dba_name: record
            .get("dbaName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        entity_type: record
            .get("entityType")
            .and_then(Value::as_str)
            .unwrap_or("CARRIER")
            .to_string(),
        operating_status: record
            .get("operatingStatus")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string(),
        physical_address: format_address(record),
        phone: record.get("phyPhone").and_then(Value::as_str).map(str::to_string),
    })
}

fn format_address(record: &Value) -> Option<String> {
    let parts = ["phyStreet", "phyCity", "phyState", "phyZipcode"]
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
