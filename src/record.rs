use std::collections::hash_set;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use ipnetwork::IpNetwork;

use crate::error::DomainError;
use crate::validation::validate_dns_name;

/// A validated DNS name, stored lowercase without the trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    pub fn new(name: &str) -> Result<Self, DomainError> {
        let name = name.trim();
        validate_dns_name(name)?;
        let name = name.strip_suffix('.').unwrap_or(name);
        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute form used for queries, so no search domain gets appended.
    pub fn to_fqdn(&self) -> String {
        format!("{}.", self.0)
    }
}

impl FromStr for DomainName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record types an SPF crawl needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Txt,
    A,
    Aaaa,
    Mx,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::Txt => "TXT",
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Mx => "MX",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordQuery {
    pub name: DomainName,
    pub record_type: RecordType,
}

impl RecordQuery {
    pub fn new(name: DomainName, record_type: RecordType) -> Self {
        Self { name, record_type }
    }
}

impl fmt::Display for RecordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.record_type)
    }
}

/// TXT values at a zone apex, in provider order.
pub type TxtRecordSet = Vec<String>;

/// Deduplicated networks gathered from one or more crawls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedIpSet(HashSet<IpNetwork>);

impl FlattenedIpSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the network was already present.
    pub fn insert(&mut self, net: IpNetwork) -> bool {
        self.0.insert(net)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, IpNetwork> {
        self.0.iter()
    }
}

impl Extend<IpNetwork> for FlattenedIpSet {
    fn extend<I: IntoIterator<Item = IpNetwork>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<IpNetwork> for FlattenedIpSet {
    fn from_iter<I: IntoIterator<Item = IpNetwork>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FlattenedIpSet {
    type Item = IpNetwork;
    type IntoIter = hash_set::IntoIter<IpNetwork>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FlattenedIpSet {
    type Item = &'a IpNetwork;
    type IntoIter = hash_set::Iter<'a, IpNetwork>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
