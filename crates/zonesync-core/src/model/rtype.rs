// # Record Types
//
// Every record type maps to one `TypeHandler` row in `HANDLERS`. A row owns
// the three type-specific concerns of the model:
//
// - `parse`: turn a raw content string (as declared, or as reported by a
//   backend) into a canonical target plus ancillary fields
// - `serialize`: render a canonical record back into one combined string
// - `validate`: check that a record built by hand is well formed
//
// Supporting a new type means adding an enum variant and one table row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::record::{Record, RecordFields};

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Mail exchanger
    Mx,
    /// Free-form text
    Txt,
    /// Name server delegation
    Ns,
    /// Reverse pointer
    Ptr,
    /// Certification authority authorization
    Caa,
    /// Service locator
    Srv,
    /// Apex CNAME flattening pseudo-record
    Alias,
    /// Registrar web redirect (302)
    Url,
    /// Registrar web redirect (301)
    Url301,
    /// Registrar framed redirect
    Frame,
}

impl RecordType {
    /// All record types, in table order
    pub const ALL: [RecordType; 13] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Caa,
        RecordType::Srv,
        RecordType::Alias,
        RecordType::Url,
        RecordType::Url301,
        RecordType::Frame,
    ];

    /// Wire name of the type (e.g. `"AAAA"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Caa => "CAA",
            RecordType::Srv => "SRV",
            RecordType::Alias => "ALIAS",
            RecordType::Url => "URL",
            RecordType::Url301 => "URL301",
            RecordType::Frame => "FRAME",
        }
    }

    /// Types every backend can store; they never need a capability entry
    pub fn is_baseline(&self) -> bool {
        matches!(
            self,
            RecordType::A
                | RecordType::Aaaa
                | RecordType::Cname
                | RecordType::Mx
                | RecordType::Txt
                | RecordType::Ns
        )
    }

    /// Look up the handler row for this type
    pub fn handler(&self) -> &'static TypeHandler {
        &HANDLERS[*self as usize]
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::invalid_record(format!("unknown record type '{s}'")))
    }
}

/// Canonical target and ancillary fields produced by a parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    /// Canonical target string
    pub target: String,
    /// Type-specific fields
    pub fields: RecordFields,
}

impl ParsedTarget {
    fn plain(target: String) -> Self {
        Self {
            target,
            fields: RecordFields::None,
        }
    }
}

/// Type-specific normalize/serialize/validate triple
pub struct TypeHandler {
    /// The type this row handles
    pub record_type: RecordType,
    /// Parse raw content relative to a zone origin
    pub parse: fn(&str, &str) -> Result<ParsedTarget>,
    /// Render the canonical combined value
    pub serialize: fn(&Record) -> String,
    /// Check a record built outside `parse`
    pub validate: fn(&Record) -> Result<()>,
}

// Indexed by `RecordType as usize`; keep in declaration order.
static HANDLERS: [TypeHandler; 13] = [
    TypeHandler {
        record_type: RecordType::A,
        parse: parse_ipv4,
        serialize: serialize_target,
        validate: validate_ipv4,
    },
    TypeHandler {
        record_type: RecordType::Aaaa,
        parse: parse_ipv6,
        serialize: serialize_target,
        validate: validate_ipv6,
    },
    TypeHandler {
        record_type: RecordType::Cname,
        parse: parse_hostname,
        serialize: serialize_target,
        validate: validate_hostname,
    },
    TypeHandler {
        record_type: RecordType::Mx,
        parse: parse_mx,
        serialize: serialize_mx,
        validate: validate_mx,
    },
    TypeHandler {
        record_type: RecordType::Txt,
        parse: parse_txt,
        serialize: serialize_target,
        validate: validate_plain,
    },
    TypeHandler {
        record_type: RecordType::Ns,
        parse: parse_hostname,
        serialize: serialize_target,
        validate: validate_hostname,
    },
    TypeHandler {
        record_type: RecordType::Ptr,
        parse: parse_hostname,
        serialize: serialize_target,
        validate: validate_hostname,
    },
    TypeHandler {
        record_type: RecordType::Caa,
        parse: parse_caa,
        serialize: serialize_caa,
        validate: validate_caa,
    },
    TypeHandler {
        record_type: RecordType::Srv,
        parse: parse_srv,
        serialize: serialize_srv,
        validate: validate_srv,
    },
    TypeHandler {
        record_type: RecordType::Alias,
        parse: parse_hostname,
        serialize: serialize_target,
        validate: validate_hostname,
    },
    TypeHandler {
        record_type: RecordType::Url,
        parse: parse_verbatim,
        serialize: serialize_target,
        validate: validate_verbatim,
    },
    TypeHandler {
        record_type: RecordType::Url301,
        parse: parse_verbatim,
        serialize: serialize_target,
        validate: validate_verbatim,
    },
    TypeHandler {
        record_type: RecordType::Frame,
        parse: parse_verbatim,
        serialize: serialize_target,
        validate: validate_verbatim,
    },
];

/// Qualify a host name against `origin`, lowercased with a trailing dot.
///
/// `@` is the origin itself, names ending in `.` are already absolute and
/// anything else is relative to the origin.
pub fn canonical_host(name: &str, origin: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::invalid_record(format!("invalid host name '{name}'")));
    }

    let origin = origin.trim_end_matches('.').to_ascii_lowercase();
    let lower = name.to_ascii_lowercase();

    if lower == "@" {
        return Ok(format!("{origin}."));
    }
    if lower.ends_with('.') {
        return Ok(lower);
    }
    if origin.is_empty() {
        Ok(format!("{lower}."))
    } else {
        Ok(format!("{lower}.{origin}."))
    }
}

/// Decode TXT content: one or more quoted segments are joined, anything
/// else is taken verbatim.
fn unquote_txt(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if !raw.starts_with('"') {
        return Ok(raw.to_string());
    }

    let mut out = String::new();
    let mut chars = raw.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some('"') => {}
            Some(_) => {
                return Err(Error::invalid_record(format!(
                    "unquoted text between TXT segments in {raw}"
                )));
            }
        }
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                },
                '"' => {
                    closed = true;
                    break;
                }
                other => out.push(other),
            }
        }
        if !closed {
            return Err(Error::invalid_record(format!("unterminated TXT string {raw}")));
        }
    }
    Ok(out)
}

fn parse_u16(raw: Option<&str>, what: &str, content: &str) -> Result<u16> {
    raw.and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| Error::invalid_record(format!("invalid {what} in '{content}'")))
}

fn parse_ipv4(content: &str, _origin: &str) -> Result<ParsedTarget> {
    let addr = Ipv4Addr::from_str(content.trim())
        .map_err(|_| Error::invalid_record(format!("invalid IPv4 address '{content}'")))?;
    Ok(ParsedTarget::plain(addr.to_string()))
}

fn parse_ipv6(content: &str, _origin: &str) -> Result<ParsedTarget> {
    let addr = Ipv6Addr::from_str(content.trim())
        .map_err(|_| Error::invalid_record(format!("invalid IPv6 address '{content}'")))?;
    Ok(ParsedTarget::plain(addr.to_string()))
}

fn parse_hostname(content: &str, origin: &str) -> Result<ParsedTarget> {
    Ok(ParsedTarget::plain(canonical_host(content, origin)?))
}

fn parse_mx(content: &str, origin: &str) -> Result<ParsedTarget> {
    let mut parts = content.split_whitespace();
    let preference = parse_u16(parts.next(), "MX preference", content)?;
    let host = parts
        .next()
        .ok_or_else(|| Error::invalid_record(format!("MX record missing target: '{content}'")))?;
    if parts.next().is_some() {
        return Err(Error::invalid_record(format!("trailing data in MX record '{content}'")));
    }
    Ok(ParsedTarget {
        target: canonical_host(host, origin)?,
        fields: RecordFields::Mx { preference },
    })
}

fn parse_txt(content: &str, _origin: &str) -> Result<ParsedTarget> {
    Ok(ParsedTarget::plain(unquote_txt(content)?))
}

fn parse_caa(content: &str, _origin: &str) -> Result<ParsedTarget> {
    let mut parts = content.split_whitespace();
    let flag = parts
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| Error::invalid_record(format!("invalid CAA flag in '{content}'")))?;
    let tag = parts
        .next()
        .filter(|t| t.chars().all(|c| c.is_ascii_alphanumeric()))
        .ok_or_else(|| Error::invalid_record(format!("invalid CAA tag in '{content}'")))?
        .to_ascii_lowercase();
    // The value is everything after the tag, inner whitespace included
    let value = caa_value(content.trim_start(), tag.len())
        .ok_or_else(|| Error::invalid_record(format!("CAA record missing value: '{content}'")))?;
    Ok(ParsedTarget {
        target: unquote_txt(value)?,
        fields: RecordFields::Caa { flag, tag },
    })
}

/// Text following the flag and tag words of trimmed CAA content
fn caa_value(content: &str, tag_len: usize) -> Option<&str> {
    let after_flag = content.trim_start_matches(|c: char| !c.is_whitespace());
    let after_tag = after_flag.trim_start().get(tag_len..)?;
    let value = after_tag.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_srv(content: &str, origin: &str) -> Result<ParsedTarget> {
    let mut parts = content.split_whitespace();
    let priority = parse_u16(parts.next(), "SRV priority", content)?;
    let weight = parse_u16(parts.next(), "SRV weight", content)?;
    let port = parse_u16(parts.next(), "SRV port", content)?;
    let host = parts
        .next()
        .ok_or_else(|| Error::invalid_record(format!("SRV record missing target: '{content}'")))?;
    if parts.next().is_some() {
        return Err(Error::invalid_record(format!("trailing data in SRV record '{content}'")));
    }
    Ok(ParsedTarget {
        target: canonical_host(host, origin)?,
        fields: RecordFields::Srv {
            priority,
            weight,
            port,
        },
    })
}

fn parse_verbatim(content: &str, _origin: &str) -> Result<ParsedTarget> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::invalid_record("redirect destination cannot be empty"));
    }
    Ok(ParsedTarget::plain(content.to_string()))
}

fn serialize_target(record: &Record) -> String {
    record.target.clone()
}

fn serialize_mx(record: &Record) -> String {
    match &record.fields {
        RecordFields::Mx { preference } => format!("{preference} {}", record.target),
        _ => record.target.clone(),
    }
}

fn serialize_srv(record: &Record) -> String {
    match &record.fields {
        RecordFields::Srv {
            priority,
            weight,
            port,
        } => format!("{priority} {weight} {port} {}", record.target),
        _ => record.target.clone(),
    }
}

fn serialize_caa(record: &Record) -> String {
    match &record.fields {
        RecordFields::Caa { flag, tag } => format!(
            "{flag} {tag} \"{}\"",
            record.target.replace('\\', "\\\\").replace('"', "\\\"")
        ),
        _ => record.target.clone(),
    }
}

fn expect_no_fields(record: &Record) -> Result<()> {
    if record.fields != RecordFields::None {
        return Err(Error::invalid_record(format!(
            "{} record {} carries fields of another type",
            record.record_type, record.label
        )));
    }
    Ok(())
}

fn validate_ipv4(record: &Record) -> Result<()> {
    expect_no_fields(record)?;
    let parsed = parse_ipv4(&record.target, "")?;
    if parsed.target != record.target {
        return Err(Error::invalid_record(format!(
            "A target '{}' is not in canonical form",
            record.target
        )));
    }
    Ok(())
}

fn validate_ipv6(record: &Record) -> Result<()> {
    expect_no_fields(record)?;
    let parsed = parse_ipv6(&record.target, "")?;
    if parsed.target != record.target {
        return Err(Error::invalid_record(format!(
            "AAAA target '{}' is not in canonical form",
            record.target
        )));
    }
    Ok(())
}

fn check_host(record: &Record) -> Result<()> {
    let target = &record.target;
    if !target.ends_with('.')
        || target.chars().any(char::is_whitespace)
        || target.chars().any(|c| c.is_ascii_uppercase())
    {
        return Err(Error::invalid_record(format!(
            "{} target '{}' is not a canonical host name",
            record.record_type, target
        )));
    }
    Ok(())
}

fn validate_hostname(record: &Record) -> Result<()> {
    expect_no_fields(record)?;
    check_host(record)
}

fn validate_mx(record: &Record) -> Result<()> {
    if !matches!(record.fields, RecordFields::Mx { .. }) {
        return Err(Error::invalid_record(format!(
            "MX record {} has no preference",
            record.label
        )));
    }
    check_host(record)
}

fn validate_srv(record: &Record) -> Result<()> {
    if !matches!(record.fields, RecordFields::Srv { .. }) {
        return Err(Error::invalid_record(format!(
            "SRV record {} has no priority/weight/port",
            record.label
        )));
    }
    check_host(record)
}

fn validate_caa(record: &Record) -> Result<()> {
    match &record.fields {
        RecordFields::Caa { tag, .. } if !tag.is_empty() => Ok(()),
        _ => Err(Error::invalid_record(format!(
            "CAA record {} has no flag/tag",
            record.label
        ))),
    }
}

fn validate_plain(record: &Record) -> Result<()> {
    expect_no_fields(record)
}

fn validate_verbatim(record: &Record) -> Result<()> {
    expect_no_fields(record)?;
    if record.target.trim().is_empty() {
        return Err(Error::invalid_record(format!(
            "{} record {} has an empty destination",
            record.record_type, record.label
        )));
    }
    Ok(())
}
