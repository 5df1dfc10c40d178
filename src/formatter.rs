use ipnetwork::IpNetwork;

use crate::constants::{SPF_ALL, SPF_VERSION, TXT_SEGMENT_LEN};
use crate::record::FlattenedIpSet;

/// SPF mechanism for one network: `ip4:192.0.2.0/24` or `ip6:2001:db8::/32`.
pub fn mechanism(net: &IpNetwork) -> String {
    match net {
        IpNetwork::V4(v4) => format!("ip4:{v4}"),
        IpNetwork::V6(v6) => format!("ip6:{v6}"),
    }
}

/// One mechanism per network, sorted by text so identical input always
/// produces identical output.
pub fn format(ips: &FlattenedIpSet) -> Vec<String> {
    let mut mechanisms: Vec<String> = ips.iter().map(mechanism).collect();
    mechanisms.sort();
    mechanisms
}

/// Builds the quoted TXT value `"v=spf1 <mechanisms> ~all"`.
pub fn spf_record(mechanisms: &[String]) -> String {
    let mut record = format!("\"{SPF_VERSION}");
    for m in mechanisms {
        record.push(' ');
        record.push_str(m);
    }
    record.push(' ');
    record.push_str(SPF_ALL);
    record.push('"');
    record
}

/// Number of 255-byte character-strings the unquoted value will take once
/// the DNS provider splits it.
pub fn segment_count(record: &str) -> usize {
    let len = record.trim_matches('"').len();
    len.div_ceil(TXT_SEGMENT_LEN).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spf::{parse_body, spf_body, SpfMechanism};

    fn set(nets: &[&str]) -> FlattenedIpSet {
        nets.iter().map(|n| n.parse::<IpNetwork>().unwrap()).collect()
    }

    #[test]
    fn test_mechanism_prefix_by_family() {
        assert_eq!(
            mechanism(&"192.0.2.0/24".parse().unwrap()),
            "ip4:192.0.2.0/24"
        );
        assert_eq!(
            mechanism(&"2001:db8::/32".parse().unwrap()),
            "ip6:2001:db8::/32"
        );
    }

    #[test]
    fn test_format_is_sorted() {
        let ips = set(&["2001:db8::/32", "198.51.100.1/32", "192.0.2.0/24"]);
        assert_eq!(
            format(&ips),
            vec!["ip4:192.0.2.0/24", "ip4:198.51.100.1/32", "ip6:2001:db8::/32"]
        );
        assert!(format(&FlattenedIpSet::new()).is_empty());
    }

    #[test]
    fn test_format_reparses_to_same_set() {
        let ips = set(&[
            "192.0.2.0/24",
            "198.51.100.7/32",
            "10.0.0.0/8",
            "2001:db8::/32",
            "2001:db8:ffff::1/128",
        ]);
        let reparsed: FlattenedIpSet = format(&ips)
            .iter()
            .map(|m| match SpfMechanism::parse(m) {
                SpfMechanism::Ip4(net) => IpNetwork::V4(net),
                SpfMechanism::Ip6(net) => IpNetwork::V6(net),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(reparsed, ips);
    }

    #[test]
    fn test_spf_record() {
        let mechanisms = format(&set(&["192.0.2.0/24", "2001:db8::/32"]));
        let record = spf_record(&mechanisms);
        assert_eq!(record, "\"v=spf1 ip4:192.0.2.0/24 ip6:2001:db8::/32 ~all\"");

        let body = spf_body(&record).unwrap();
        assert_eq!(parse_body(&body).len(), 3);

        assert_eq!(spf_record(&[]), "\"v=spf1 ~all\"");
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count("\"v=spf1 ~all\""), 1);
        assert_eq!(segment_count(""), 1);
        let long = format!("\"{}\"", "x".repeat(TXT_SEGMENT_LEN));
        assert_eq!(segment_count(&long), 1);
        let longer = format!("\"{}\"", "x".repeat(TXT_SEGMENT_LEN + 1));
        assert_eq!(segment_count(&longer), 2);
    }
}
