//! SPF text handling: locating the `v=spf1` body inside TXT values and
//! parsing its tokens into [`SpfMechanism`]s.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};

use crate::constants::SPF_VERSION;
use crate::error::ParseError;
use crate::record::DomainName;

/// One SPF term. Anything that does not contribute IP addresses when
/// flattened ends up in `Other` with its raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpfMechanism {
    Include(DomainName),
    A {
        domain: Option<DomainName>,
        cidr4: Option<u8>,
        cidr6: Option<u8>,
    },
    Mx {
        domain: Option<DomainName>,
        cidr4: Option<u8>,
        cidr6: Option<u8>,
    },
    Ip4(Ipv4Network),
    Ip6(Ipv6Network),
    Redirect(DomainName),
    All,
    Other(String),
}

impl SpfMechanism {
    /// Parses a single whitespace-free token. Never fails: malformed or
    /// unsupported tokens become `Other`.
    pub fn parse(token: &str) -> Self {
        match Self::try_parse(token) {
            Ok(mechanism) => mechanism,
            Err(e) => {
                log::debug!("Keeping SPF token as-is: {e}");
                SpfMechanism::Other(token.to_string())
            }
        }
    }

    pub fn try_parse(token: &str) -> Result<Self, ParseError> {
        let (qualifier, term) = match token.chars().next() {
            Some(q @ ('+' | '-' | '~' | '?')) => (q, &token[1..]),
            _ => ('+', token),
        };
        let split = term.find([':', '/', '=']).unwrap_or(term.len());
        let name = term[..split].to_ascii_lowercase();
        let rest = &term[split..];

        if name == "all" && rest.is_empty() {
            return Ok(SpfMechanism::All);
        }
        // Only passing terms can be flattened into passing ip4/ip6 entries
        if qualifier != '+' {
            return Err(ParseError::Unsupported(token.to_string()));
        }

        match (name.as_str(), rest) {
            ("include", r) if r.starts_with(':') => {
                Ok(SpfMechanism::Include(parse_domain(token, &r[1..])?))
            }
            ("redirect", r) if r.starts_with('=') => {
                Ok(SpfMechanism::Redirect(parse_domain(token, &r[1..])?))
            }
            ("ip4", r) if r.starts_with(':') => parse_ip4(&r[1..])
                .map(SpfMechanism::Ip4)
                .ok_or_else(|| ParseError::Network(token.to_string())),
            ("ip6", r) if r.starts_with(':') => parse_ip6(&r[1..])
                .map(SpfMechanism::Ip6)
                .ok_or_else(|| ParseError::Network(token.to_string())),
            ("a", r) => {
                let (domain, cidr4, cidr6) = parse_host_spec(token, r)?;
                Ok(SpfMechanism::A {
                    domain,
                    cidr4,
                    cidr6,
                })
            }
            ("mx", r) => {
                let (domain, cidr4, cidr6) = parse_host_spec(token, r)?;
                Ok(SpfMechanism::Mx {
                    domain,
                    cidr4,
                    cidr6,
                })
            }
            _ => Err(ParseError::Unsupported(token.to_string())),
        }
    }
}

fn parse_domain(token: &str, raw: &str) -> Result<DomainName, ParseError> {
    DomainName::new(raw).map_err(|source| ParseError::Domain {
        token: token.to_string(),
        source,
    })
}

fn parse_ip4(raw: &str) -> Option<Ipv4Network> {
    match raw.split_once('/') {
        Some((addr, len)) => {
            Ipv4Network::new(addr.parse::<Ipv4Addr>().ok()?, len.parse().ok()?).ok()
        }
        None => Some(Ipv4Network::from(raw.parse::<Ipv4Addr>().ok()?)),
    }
}

fn parse_ip6(raw: &str) -> Option<Ipv6Network> {
    match raw.split_once('/') {
        Some((addr, len)) => {
            Ipv6Network::new(addr.parse::<Ipv6Addr>().ok()?, len.parse().ok()?).ok()
        }
        None => Some(Ipv6Network::from(raw.parse::<Ipv6Addr>().ok()?)),
    }
}

type HostSpec = (Option<DomainName>, Option<u8>, Option<u8>);

/// Parses the `[:domain][/cidr4][//cidr6]` tail of `a` and `mx`.
fn parse_host_spec(token: &str, rest: &str) -> Result<HostSpec, ParseError> {
    let (domain_part, mut cidr_part) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    let domain = match domain_part {
        "" => None,
        d => match d.strip_prefix(':') {
            Some(name) => Some(parse_domain(token, name)?),
            None => return Err(ParseError::Unsupported(token.to_string())),
        },
    };

    let mut cidr6 = None;
    if let Some(i) = cidr_part.find("//") {
        cidr6 = Some(parse_cidr_len(token, &cidr_part[i + 2..], 128)?);
        cidr_part = &cidr_part[..i];
    }
    let cidr4 = match cidr_part.strip_prefix('/') {
        Some(len) => Some(parse_cidr_len(token, len, 32)?),
        None if cidr_part.is_empty() => None,
        None => return Err(ParseError::CidrLength(token.to_string())),
    };

    Ok((domain, cidr4, cidr6))
}

fn parse_cidr_len(token: &str, raw: &str, max: u8) -> Result<u8, ParseError> {
    match raw.parse::<u8>() {
        Ok(len) if len <= max => Ok(len),
        _ => Err(ParseError::CidrLength(token.to_string())),
    }
}

pub fn is_spf(txt: &str) -> bool {
    txt.contains(SPF_VERSION)
}

/// Removes the `" "` boundaries left when a long TXT value is split into
/// several quoted character-strings, e.g. `"v=spf1 a" " mx"` becomes
/// `"v=spf1 a mx"`.
pub fn collapse_segments(txt: &str) -> String {
    let mut out = String::with_capacity(txt.len());
    let mut rest = txt;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let gap = after.len() - after.trim_start().len();
        if gap > 0 && after[gap..].starts_with('"') {
            out.push_str(&rest[..start]);
            rest = &after[gap + 1..];
        } else {
            out.push_str(&rest[..=start]);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Returns the text following `v=spf1` with quoting removed, or `None`
/// when the value is not an SPF record.
pub fn spf_body(txt: &str) -> Option<String> {
    let collapsed = collapse_segments(txt);
    let start = collapsed.find(SPF_VERSION)?;
    let body = &collapsed[start + SPF_VERSION.len()..];
    Some(body.replace('"', " ").trim().to_string())
}

/// Tokenizes an SPF body into mechanisms, in record order.
pub fn parse_body(body: &str) -> Vec<SpfMechanism> {
    body.split_whitespace().map(SpfMechanism::parse).collect()
}
