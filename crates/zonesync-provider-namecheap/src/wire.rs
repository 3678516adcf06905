//! Namecheap wire format
//!
//! Every call is a request against one endpoint with the command and its
//! arguments as query parameters. Responses are XML documents wrapped in an
//! `ApiResponse` envelope whose `Status` attribute is `OK` or `ERROR`.

use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::debug;
use zonesync_core::model::{Record, RecordFields};
use zonesync_core::{Error, RecordType, Result};

use crate::PROVIDER_NAME;

/// `ApiResponse` envelope
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    /// `OK` or `ERROR`
    #[serde(rename = "@Status")]
    pub status: String,

    #[serde(rename = "Errors", default)]
    pub errors: ApiErrors,

    #[serde(rename = "CommandResponse", default)]
    pub command: CommandResponse,
}

/// `Errors` element
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrors {
    #[serde(rename = "Error", default)]
    pub items: Vec<ApiError>,
}

/// One `Error` element
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(rename = "@Number", default)]
    pub number: String,

    #[serde(rename = "$text", default)]
    pub message: String,
}

/// `CommandResponse` element; only the result of the issued command is set
#[derive(Debug, Default, Deserialize)]
pub struct CommandResponse {
    #[serde(rename = "DomainDNSGetHostsResult")]
    pub hosts: Option<HostsResult>,

    #[serde(rename = "DomainDNSSetHostsResult")]
    pub set_hosts: Option<SetHostsResult>,

    #[serde(rename = "DomainGetInfoResult")]
    pub info: Option<DomainInfoResult>,

    #[serde(rename = "DomainDNSSetCustomResult")]
    pub set_custom: Option<SetCustomResult>,
}

/// Result of `namecheap.domains.dns.getHosts`
#[derive(Debug, Default, Deserialize)]
pub struct HostsResult {
    #[serde(rename = "host", default)]
    pub hosts: Vec<Host>,
}

/// One host entry
#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    #[serde(rename = "@Name")]
    pub name: String,

    #[serde(rename = "@Type")]
    pub host_type: String,

    #[serde(rename = "@Address")]
    pub address: String,

    #[serde(rename = "@MXPref", default)]
    pub mx_pref: u16,

    #[serde(rename = "@TTL", default)]
    pub ttl: u32,
}

/// Result of `namecheap.domains.dns.setHosts`
#[derive(Debug, Deserialize)]
pub struct SetHostsResult {
    #[serde(rename = "@IsSuccess", default)]
    pub is_success: String,
}

/// Result of `namecheap.domains.getInfo`
#[derive(Debug, Default, Deserialize)]
pub struct DomainInfoResult {
    #[serde(rename = "DnsDetails", default)]
    pub dns: DnsDetails,
}

/// Delegation part of the domain info
#[derive(Debug, Default, Deserialize)]
pub struct DnsDetails {
    #[serde(rename = "Nameserver", default)]
    pub nameservers: Vec<String>,
}

/// Result of `namecheap.domains.dns.setCustom`
#[derive(Debug, Deserialize)]
pub struct SetCustomResult {
    #[serde(rename = "@Updated", default)]
    pub updated: String,
}

/// Parse a response body and turn an `ERROR` status into an engine error
pub fn parse_response(body: &str) -> Result<ApiResponse> {
    let response: ApiResponse = from_str(body).map_err(|e| {
        Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
    })?;

    if !response.status.eq_ignore_ascii_case("OK") {
        let detail = response
            .errors
            .items
            .iter()
            .map(|e| format!("{} ({})", e.message.trim(), e.number))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::provider(
            PROVIDER_NAME,
            format!("API returned {}: {}", response.status, detail),
        ));
    }

    Ok(response)
}

/// Split a registered domain into `(sld, tld)`
///
/// Everything after the first label is the TLD, which covers multi-label
/// suffixes such as `co.uk`.
pub fn split_domain(domain: &str) -> Result<(String, String)> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    match domain.split_once('.') {
        Some((sld, tld)) if !sld.is_empty() && !tld.is_empty() => {
            Ok((sld.to_string(), tld.to_string()))
        }
        _ => Err(Error::config(format!(
            "'{}' is not a registered domain name",
            domain
        ))),
    }
}

/// Convert host entries into canonical records
///
/// Host types the record model does not know are skipped.
pub fn records_from_hosts(zone: &str, hosts: &[Host]) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(hosts.len());
    for host in hosts {
        let rtype: RecordType = match host.host_type.parse() {
            Ok(rtype) => rtype,
            Err(_) => {
                debug!("Skipping {} host {}", host.host_type, host.name);
                continue;
            }
        };
        let content = match rtype {
            RecordType::Mx => format!("{} {}", host.mx_pref, host.address),
            _ => host.address.clone(),
        };
        records.push(Record::parse(&host.name, rtype, &content, host.ttl, zone)?);
    }
    Ok(records)
}

/// Query parameters of `namecheap.domains.dns.setHosts` for a whole zone
///
/// Hosts are numbered from 1 in the order given.
pub fn set_hosts_params(records: &[Record]) -> Vec<(String, String)> {
    let mut params = Vec::with_capacity(records.len() * 5);
    for (idx, record) in records.iter().enumerate() {
        let n = idx + 1;
        let address = match record.record_type {
            RecordType::Caa => record.combined(),
            _ => record.target.clone(),
        };
        params.push((format!("HostName{n}"), record.label.clone()));
        params.push((format!("RecordType{n}"), record.record_type.to_string()));
        params.push((format!("Address{n}"), address));
        if let RecordFields::Mx { preference } = record.fields {
            params.push((format!("MXPref{n}"), preference.to_string()));
        }
        params.push((format!("TTL{n}"), record.ttl.to_string()));
    }
    params
}
