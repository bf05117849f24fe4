//! Azure Blob Storage backend construction.

use std::collections::HashMap;
use std::sync::Arc;

use object_store::RetryConfig;
use object_store::azure::{AzureConfigKey, MicrosoftAzure, MicrosoftAzureBuilder};

use crate::error::{ExportError, Result};

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Parsed Azure storage connection string.
///
/// Only the keys that affect blob access are kept.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureConnectionString {
    pub account: Option<String>,
    pub access_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: Option<String>,
    pub protocol: String,
    pub endpoint_suffix: String,
    pub use_emulator: bool,
}

impl AzureConnectionString {
    /// Parse `Key=Value;Key=Value` pairs; keys are case-insensitive.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut pairs = HashMap::new();
        for segment in connection_string.split(';').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            // Account keys are base64 and end in '=', so split only once
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ExportError::config_invalid(format!(
                    "Malformed storage connection string segment '{segment}'"
                ))
            })?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let use_emulator = pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let parsed = Self {
            account: pairs.remove("accountname"),
            access_key: pairs.remove("accountkey"),
            sas_token: pairs.remove("sharedaccesssignature"),
            blob_endpoint: pairs.remove("blobendpoint"),
            protocol: pairs
                .remove("defaultendpointsprotocol")
                .unwrap_or_else(|| "https".to_string()),
            endpoint_suffix: pairs
                .remove("endpointsuffix")
                .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            use_emulator,
        };

        if !parsed.use_emulator && parsed.account_name().is_none() {
            return Err(ExportError::config_invalid(
                "Storage connection string names no account: set AccountName or a BlobEndpoint \
                 of the form https://<account>.blob.<suffix> or http://<host>/<account>",
            ));
        }
        if !parsed.use_emulator && parsed.access_key.is_none() && parsed.sas_token.is_none() {
            return Err(ExportError::config_invalid(
                "Storage connection string has neither AccountKey nor SharedAccessSignature",
            ));
        }

        Ok(parsed)
    }

    /// Storage account name, from `AccountName` or else from `BlobEndpoint`.
    ///
    /// `https://acme.blob.core.windows.net` yields `acme`;
    /// `http://127.0.0.1:10000/devstoreaccount1` yields `devstoreaccount1`.
    pub fn account_name(&self) -> Option<String> {
        if let Some(account) = &self.account {
            return Some(account.clone());
        }
        let endpoint = self.blob_endpoint.as_deref()?;
        let rest = endpoint
            .split_once("://")
            .map_or(endpoint, |(_, rest)| rest);
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host = host.split(':').next().unwrap_or_default();

        let from_host = host
            .split_once(".blob.")
            .map(|(label, _)| label)
            .filter(|label| !label.is_empty());
        let account = match from_host {
            Some(label) => label,
            None => path.split('/').find(|segment| !segment.is_empty())?,
        };
        Some(account.to_string())
    }

    /// Blob service endpoint URL.
    pub fn endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.blob_endpoint {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        self.account.as_ref().map(|account| {
            format!("{}://{}.blob.{}", self.protocol, account, self.endpoint_suffix)
        })
    }

    /// Build a store bound to one container.
    ///
    /// Transport-level retries are disabled: uploads are attempted once.
    pub fn build_store(&self, container: &str) -> Result<Arc<MicrosoftAzure>> {
        let retry = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };

        let mut builder = MicrosoftAzureBuilder::new()
            .with_container_name(container)
            .with_retry(retry);

        if self.use_emulator {
            builder = builder.with_use_emulator(true);
        } else {
            if let Some(account) = self.account_name() {
                builder = builder.with_account(account);
            }
            if let Some(key) = &self.access_key {
                builder = builder.with_access_key(key);
            }
            if let Some(sas) = &self.sas_token {
                builder = builder.with_config(AzureConfigKey::SasKey, sas.trim_start_matches('?'));
            }
            if let Some(endpoint) = self.endpoint() {
                builder = builder
                    .with_allow_http(endpoint.starts_with("http://"))
                    .with_endpoint(endpoint);
            }
        }

        let store = builder.build().map_err(|e| {
            ExportError::config_invalid("Invalid Azure storage configuration").with_source(e)
        })?;
        Ok(Arc::new(store))
    }
}

impl std::fmt::Debug for AzureConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConnectionString")
            .field("account", &self.account)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint())
            .field("use_emulator", &self.use_emulator)
            .finish()
    }
}
