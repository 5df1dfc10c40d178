use std::net::{IpAddr, Ipv4Addr};

/// Resolvers used when no `--dns` is given
pub const DEFAULT_NAMESERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
];

pub const DNS_PORT: u16 = 53;
pub const DEFAULT_DNS_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_DNS_ATTEMPTS: usize = 2;

/// Nesting bound for include/redirect chains, on top of the visited set
pub const MAX_INCLUDE_DEPTH: usize = 10;

/// Marker that identifies an SPF record among other TXT records
pub const SPF_VERSION: &str = "v=spf1";

/// Terminal mechanism of every generated record
pub const SPF_ALL: &str = "~all";

/// A single character-string inside a TXT record is capped at 255 bytes
pub const TXT_SEGMENT_LEN: usize = 255;

pub const GANDI_API_URL: &str = "https://api.gandi.net/v5/livedns";
pub const GANDI_APIKEY_ENV: &str = "GANDI_APIKEY";
pub const HTTP_TIMEOUT_SECS: u64 = 30;
