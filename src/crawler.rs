//! Recursive SPF resolution.
//!
//! [`crawl`] walks an SPF policy with an explicit work stack instead of call
//! recursion. Every include/redirect target is expanded at most once per
//! crawl, and nesting deeper than `FlattenConfig::max_depth` is cut off, so
//! include loops terminate. Lookup failures below the starting query only
//! remove that branch; a failure of the starting query itself, or a starting
//! TXT set without an SPF record, is yielded as an error and ends the crawl.

use std::collections::{HashSet, VecDeque};
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::config::FlattenConfig;
use crate::error::{ResolutionCause, ResolutionError};
use crate::fetcher::RecordFetcher;
use crate::record::{DomainName, FlattenedIpSet, RecordQuery, RecordType};
use crate::spf::{parse_body, spf_body, SpfMechanism};

#[derive(Debug)]
enum Task {
    Spf {
        domain: DomainName,
        depth: usize,
    },
    Exchange {
        domain: DomainName,
        cidr4: Option<u8>,
        cidr6: Option<u8>,
        depth: usize,
    },
    Address {
        query: RecordQuery,
        prefix: Option<u8>,
        depth: usize,
    },
}

/// Lazy, single-pass sequence of the networks a policy authorizes.
///
/// Each network is yielded once. The visited set belongs to this value and
/// is never shared between crawls.
pub struct Crawl<'a, F: RecordFetcher + ?Sized> {
    fetcher: &'a F,
    root: DomainName,
    max_depth: usize,
    stack: Vec<Task>,
    pending: VecDeque<IpNetwork>,
    visited: HashSet<DomainName>,
    emitted: HashSet<IpNetwork>,
    lookups: usize,
}

/// Starts a crawl of `query`. TXT queries are read as SPF policies, A/AAAA
/// and MX queries are resolved to addresses directly. `root` is the policy
/// the crawl was started for and only labels log output.
pub fn crawl<'a, F: RecordFetcher + ?Sized>(
    fetcher: &'a F,
    query: RecordQuery,
    root: &DomainName,
    config: &FlattenConfig,
) -> Crawl<'a, F> {
    let task = match query.record_type {
        RecordType::Txt => Task::Spf {
            domain: query.name,
            depth: 0,
        },
        RecordType::Mx => Task::Exchange {
            domain: query.name,
            cidr4: None,
            cidr6: None,
            depth: 0,
        },
        RecordType::A | RecordType::Aaaa => Task::Address {
            query,
            prefix: None,
            depth: 0,
        },
    };
    Crawl {
        fetcher,
        root: root.clone(),
        max_depth: config.max_depth,
        stack: vec![task],
        pending: VecDeque::new(),
        visited: HashSet::new(),
        emitted: HashSet::new(),
        lookups: 0,
    }
}

impl<F: RecordFetcher + ?Sized> Crawl<'_, F> {
    fn emit(&mut self, net: IpNetwork) {
        if self.emitted.insert(net) {
            self.pending.push_back(net);
        }
    }

    fn fetch(
        &mut self,
        query: &RecordQuery,
        depth: usize,
    ) -> Result<Option<Vec<String>>, ResolutionError> {
        self.lookups += 1;
        match self.fetcher.resolve(query) {
            Ok(values) => Ok(Some(values)),
            Err(e) if depth == 0 => Err(e),
            Err(e) => {
                match (&e.cause, query.record_type) {
                    // plenty of hosts have no IPv6 address
                    (ResolutionCause::NotFound, RecordType::Aaaa) => {
                        log::debug!("[{}] {e}", self.root)
                    }
                    _ => log::warn!("[{}] {e}, skipping", self.root),
                }
                Ok(None)
            }
        }
    }

    fn run(&mut self, task: Task) -> Result<(), ResolutionError> {
        match task {
            Task::Spf { domain, depth } => self.run_spf(domain, depth),
            Task::Exchange {
                domain,
                cidr4,
                cidr6,
                depth,
            } => {
                let query = RecordQuery::new(domain, RecordType::Mx);
                let Some(exchanges) = self.fetch(&query, depth)? else {
                    return Ok(());
                };
                for exchange in exchanges {
                    match DomainName::new(&exchange) {
                        Ok(host) => self.push_addresses(host, cidr4, cidr6, depth + 1),
                        Err(e) => log::debug!(
                            "[{}] ignoring MX host '{exchange}' of {}: {e}",
                            self.root,
                            query.name
                        ),
                    }
                }
                Ok(())
            }
            Task::Address {
                query,
                prefix,
                depth,
            } => {
                let Some(addresses) = self.fetch(&query, depth)? else {
                    return Ok(());
                };
                for raw in addresses {
                    match address_network(&raw, prefix) {
                        Some(net) => self.emit(net),
                        None => log::warn!(
                            "[{}] {query} returned unusable address '{raw}'",
                            self.root
                        ),
                    }
                }
                Ok(())
            }
        }
    }

    fn run_spf(&mut self, domain: DomainName, depth: usize) -> Result<(), ResolutionError> {
        if depth > self.max_depth {
            log::warn!(
                "[{}] {domain} is nested deeper than {} levels, skipping",
                self.root,
                self.max_depth
            );
            return Ok(());
        }
        if !self.visited.insert(domain.clone()) {
            log::warn!("[{}] {domain} already visited, skipping include loop", self.root);
            return Ok(());
        }

        let query = RecordQuery::new(domain, RecordType::Txt);
        let Some(values) = self.fetch(&query, depth)? else {
            return Ok(());
        };
        let mut bodies = values.iter().filter_map(|v| spf_body(v));
        let Some(body) = bodies.next() else {
            // a provider must publish an SPF policy of its own
            if depth == 0 {
                return Err(ResolutionError {
                    domain: query.name.to_string(),
                    record_type: RecordType::Txt,
                    cause: ResolutionCause::NotFound,
                });
            }
            log::debug!("[{}] {} has no SPF record", self.root, query.name);
            return Ok(());
        };
        if bodies.next().is_some() {
            log::warn!(
                "[{}] {} publishes several SPF records, using the first",
                self.root,
                query.name
            );
        }
        log::debug!("[{}] {}: v=spf1 {body}", self.root, query.name);

        // reversed so the stack pops children in record order
        for mechanism in parse_body(&body).into_iter().rev() {
            match mechanism {
                SpfMechanism::Ip4(net) => self.emit(IpNetwork::V4(net)),
                SpfMechanism::Ip6(net) => self.emit(IpNetwork::V6(net)),
                SpfMechanism::Include(target) | SpfMechanism::Redirect(target) => {
                    self.stack.push(Task::Spf {
                        domain: target,
                        depth: depth + 1,
                    });
                }
                SpfMechanism::A {
                    domain,
                    cidr4,
                    cidr6,
                } => {
                    let host = domain.unwrap_or_else(|| query.name.clone());
                    self.push_addresses(host, cidr4, cidr6, depth + 1);
                }
                SpfMechanism::Mx {
                    domain,
                    cidr4,
                    cidr6,
                } => {
                    self.stack.push(Task::Exchange {
                        domain: domain.unwrap_or_else(|| query.name.clone()),
                        cidr4,
                        cidr6,
                        depth: depth + 1,
                    });
                }
                SpfMechanism::All => {}
                SpfMechanism::Other(raw) => {
                    log::debug!("[{}] {}: not flattening '{raw}'", self.root, query.name);
                }
            }
        }
        Ok(())
    }

    fn push_addresses(
        &mut self,
        host: DomainName,
        cidr4: Option<u8>,
        cidr6: Option<u8>,
        depth: usize,
    ) {
        self.stack.push(Task::Address {
            query: RecordQuery::new(host.clone(), RecordType::Aaaa),
            prefix: cidr6,
            depth,
        });
        self.stack.push(Task::Address {
            query: RecordQuery::new(host, RecordType::A),
            prefix: cidr4,
            depth,
        });
    }
}

impl<F: RecordFetcher + ?Sized> Iterator for Crawl<'_, F> {
    type Item = Result<IpNetwork, ResolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(net) = self.pending.pop_front() {
                return Some(Ok(net));
            }
            let task = self.stack.pop()?;
            if let Err(e) = self.run(task) {
                self.stack.clear();
                return Some(Err(e));
            }
            if self.stack.is_empty() && self.pending.is_empty() {
                log::debug!(
                    "[{}] crawl done: {} networks, {} lookups",
                    self.root,
                    self.emitted.len(),
                    self.lookups
                );
            }
        }
    }
}

/// Turns a resolved address into a network, widened to `prefix` when the
/// mechanism carried a CIDR length.
fn address_network(raw: &str, prefix: Option<u8>) -> Option<IpNetwork> {
    let ip: IpAddr = raw.trim().parse().ok()?;
    let len = prefix.unwrap_or(match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    });
    let net = IpNetwork::new(ip, len).ok()?;
    IpNetwork::new(net.network(), len).ok()
}

/// Crawls every provider's SPF policy and unions the results.
///
/// A provider whose own TXT lookup fails, or whose TXT set holds no SPF
/// record, aborts the whole run: publishing a record without that provider's
/// networks would reject its mail.
pub fn flatten_providers<F: RecordFetcher + ?Sized>(
    fetcher: &F,
    providers: &[DomainName],
    config: &FlattenConfig,
) -> Result<FlattenedIpSet, ResolutionError> {
    let mut ips = FlattenedIpSet::new();
    for provider in providers {
        let query = RecordQuery::new(provider.clone(), RecordType::Txt);
        let found = crawl(fetcher, query, provider, config)
            .collect::<Result<Vec<IpNetwork>, _>>()
            .inspect_err(|e| log::error!("Cannot flatten SPF of {provider}: {e}"))?;
        log::info!("{provider}: {} networks", found.len());
        for net in found {
            if !ips.insert(net) {
                log::debug!("{net} of {provider} already listed");
            }
        }
    }
    log::debug!("Flattened networks: {ips:?}");
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::mock::MockFetcher;

    fn domain(name: &str) -> DomainName {
        DomainName::new(name).unwrap()
    }

    fn net(raw: &str) -> IpNetwork {
        raw.parse().unwrap()
    }

    fn crawl_txt(
        fetcher: &MockFetcher,
        name: &str,
        config: &FlattenConfig,
    ) -> Result<Vec<IpNetwork>, ResolutionError> {
        let root = domain(name);
        let query = RecordQuery::new(root.clone(), RecordType::Txt);
        crawl(fetcher, query, &root, config).collect()
    }

    fn sorted(mut nets: Vec<IpNetwork>) -> Vec<String> {
        let mut out: Vec<String> = nets.drain(..).map(|n| n.to_string()).collect();
        out.sort();
        out
    }

    #[test]
    fn test_ip_literals_yielded_once() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt(
            "example.com",
            "v=spf1 ip4:192.0.2.0/24 ip6:2001:db8::/32 ip4:192.0.2.0/24 ip4:198.51.100.7 ~all",
        );
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(nets.len(), 3);
        assert_eq!(
            sorted(nets),
            vec!["192.0.2.0/24", "198.51.100.7/32", "2001:db8::/32"]
        );
    }

    #[test]
    fn test_include_and_redirect_followed() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("example.com", "v=spf1 include:_spf.example.net redirect=_spf.example.org");
        fetcher.add_txt("_spf.example.net", "v=spf1 ip4:192.0.2.1 -all");
        fetcher.add_txt("_spf.example.org", "v=spf1 ip6:2001:db8::1 -all");
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(sorted(nets), vec!["192.0.2.1/32", "2001:db8::1/128"]);
    }

    #[test]
    fn test_self_include_terminates() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("loop.example", "v=spf1 include:loop.example ip4:192.0.2.1 ~all");
        let nets = crawl_txt(&fetcher, "loop.example", &FlattenConfig::default()).unwrap();
        assert_eq!(nets, vec![net("192.0.2.1/32")]);
        assert_eq!(fetcher.count("loop.example", RecordType::Txt), 1);
    }

    #[test]
    fn test_include_cycle_terminates() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("a.example", "v=spf1 include:b.example ip4:192.0.2.1 ~all");
        fetcher.add_txt("b.example", "v=spf1 include:c.example ip4:192.0.2.2 ~all");
        fetcher.add_txt("c.example", "v=spf1 include:a.example ip4:192.0.2.3 ~all");
        let nets = crawl_txt(&fetcher, "a.example", &FlattenConfig::default()).unwrap();
        assert_eq!(
            sorted(nets),
            vec!["192.0.2.1/32", "192.0.2.2/32", "192.0.2.3/32"]
        );
        for name in ["a.example", "b.example", "c.example"] {
            assert_eq!(fetcher.count(name, RecordType::Txt), 1, "{name}");
        }
    }

    #[test]
    fn test_shared_include_fetched_once() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("root.example", "v=spf1 include:x.example include:y.example ~all");
        fetcher.add_txt("x.example", "v=spf1 include:shared.example ~all");
        fetcher.add_txt("y.example", "v=spf1 include:shared.example ~all");
        fetcher.add_txt("shared.example", "v=spf1 ip4:203.0.113.0/24 ~all");
        let nets = crawl_txt(&fetcher, "root.example", &FlattenConfig::default()).unwrap();
        assert_eq!(nets, vec![net("203.0.113.0/24")]);
        assert_eq!(fetcher.count("shared.example", RecordType::Txt), 1);
    }

    #[test]
    fn test_depth_bound() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("l0.example", "v=spf1 ip4:192.0.2.0 include:l1.example");
        fetcher.add_txt("l1.example", "v=spf1 ip4:192.0.2.1 include:l2.example");
        fetcher.add_txt("l2.example", "v=spf1 ip4:192.0.2.2 include:l3.example");
        fetcher.add_txt("l3.example", "v=spf1 ip4:192.0.2.3");
        let config = FlattenConfig::default().with_max_depth(2);
        let nets = crawl_txt(&fetcher, "l0.example", &config).unwrap();
        assert_eq!(
            sorted(nets),
            vec!["192.0.2.0/32", "192.0.2.1/32", "192.0.2.2/32"]
        );
        assert_eq!(fetcher.count("l3.example", RecordType::Txt), 0);
    }

    #[test]
    fn test_a_and_mx_resolved() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt(
            "example.com",
            "v=spf1 a mx:mail.example.net/24 a:www.example.org//64 ~all",
        );
        fetcher.add("example.com", RecordType::A, &["192.0.2.10"]);
        fetcher.add("example.com", RecordType::Aaaa, &["2001:db8::10"]);
        fetcher.add("mail.example.net", RecordType::Mx, &["mx1.example.net.", "mx2.example.net."]);
        fetcher.add("mx1.example.net", RecordType::A, &["198.51.100.25"]);
        fetcher.add("mx2.example.net", RecordType::A, &["198.51.100.200"]);
        fetcher.add("www.example.org", RecordType::Aaaa, &["2001:db8:1:2::abcd"]);
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(
            sorted(nets),
            vec![
                "192.0.2.10/32",
                "198.51.100.0/24",
                "2001:db8:1:2::/64",
                "2001:db8::10/128",
            ]
        );
    }

    #[test]
    fn test_nested_failures_are_swallowed() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt(
            "example.com",
            "v=spf1 include:gone.example a:nohost.example ip4:192.0.2.1 ~all",
        );
        fetcher.add_err("gone.example", RecordType::Txt, ResolutionCause::Timeout);
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(nets, vec![net("192.0.2.1/32")]);
    }

    #[test]
    fn test_root_failure_is_reported() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_err("example.com", RecordType::Txt, ResolutionCause::Timeout);
        let err = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap_err();
        assert_eq!(err.domain, "example.com");
        assert_eq!(err.record_type, RecordType::Txt);
        assert_eq!(err.cause, ResolutionCause::Timeout);
    }

    #[test]
    fn test_root_without_spf_is_error() {
        let mut fetcher = MockFetcher::new();
        fetcher.add("example.com", RecordType::Txt, &["google-site-verification=xyz"]);
        let err = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap_err();
        assert_eq!(err.domain, "example.com");
        assert_eq!(err.record_type, RecordType::Txt);
        assert_eq!(err.cause, ResolutionCause::NotFound);
    }

    #[test]
    fn test_nested_without_spf_is_skipped() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("example.com", "v=spf1 include:nospf.example ip4:192.0.2.1 ~all");
        fetcher.add("nospf.example", RecordType::Txt, &["verification=abc"]);
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(nets, vec![net("192.0.2.1/32")]);
    }

    #[test]
    fn test_flatten_providers_aborts_on_provider_without_spf() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("spf.good.example", "v=spf1 ip4:192.0.2.0/24 ~all");
        fetcher.add("spf.bad.example", RecordType::Txt, &["google-site-verification=abc"]);
        let providers = vec![domain("spf.good.example"), domain("spf.bad.example")];
        let err = flatten_providers(&fetcher, &providers, &FlattenConfig::default()).unwrap_err();
        assert_eq!(err.domain, "spf.bad.example");
        assert_eq!(err.cause, ResolutionCause::NotFound);
    }

    #[test]
    fn test_first_spf_record_used() {
        let mut fetcher = MockFetcher::new();
        fetcher.add(
            "example.com",
            RecordType::Txt,
            &["other", "v=spf1 ip4:192.0.2.1", "v=spf1 ip4:192.0.2.2"],
        );
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(nets, vec![net("192.0.2.1/32")]);
    }

    #[test]
    fn test_segmented_txt_value() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("example.com", "\"v=spf1 ip4:192.0.2.1 ip4:192.0.\" \"2.2 ~all\"");
        let nets = crawl_txt(&fetcher, "example.com", &FlattenConfig::default()).unwrap();
        assert_eq!(sorted(nets), vec!["192.0.2.1/32", "192.0.2.2/32"]);
    }

    #[test]
    fn test_crawl_address_query() {
        let mut fetcher = MockFetcher::new();
        fetcher.add("host.example", RecordType::A, &["192.0.2.5", "not-an-ip"]);
        let root = domain("host.example");
        let mut crawl = crawl(
            &fetcher,
            RecordQuery::new(root.clone(), RecordType::A),
            &root,
            &FlattenConfig::default(),
        );
        assert_eq!(crawl.next(), Some(Ok(net("192.0.2.5/32"))));
        assert_eq!(crawl.next(), None);
        assert_eq!(fetcher.count("host.example", RecordType::A), 1);
    }

    #[test]
    fn test_crawl_mx_query_root_failure() {
        let fetcher = MockFetcher::new();
        let root = domain("example.com");
        let results: Vec<_> = crawl(
            &fetcher,
            RecordQuery::new(root.clone(), RecordType::Mx),
            &root,
            &FlattenConfig::default(),
        )
        .collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_flatten_providers_unions() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("one.example", "v=spf1 ip4:192.0.2.1 ip4:192.0.2.2 ~all");
        fetcher.add_txt("two.example", "v=spf1 ip4:192.0.2.2 ip6:2001:db8::/48 ~all");
        let providers = vec![domain("one.example"), domain("two.example")];
        let ips = flatten_providers(&fetcher, &providers, &FlattenConfig::default()).unwrap();
        assert_eq!(ips.len(), 3);
        assert!(ips.iter().any(|n| *n == net("2001:db8::/48")));
    }

    #[test]
    fn test_flatten_providers_aborts_on_root_failure() {
        let mut fetcher = MockFetcher::new();
        fetcher.add_txt("one.example", "v=spf1 ip4:192.0.2.1 ~all");
        let providers = vec![domain("one.example"), domain("missing.example")];
        let err = flatten_providers(&fetcher, &providers, &FlattenConfig::default()).unwrap_err();
        assert_eq!(err.domain, "missing.example");
    }

    #[test]
    fn test_address_network() {
        assert_eq!(address_network("192.0.2.77", None), Some(net("192.0.2.77/32")));
        assert_eq!(address_network("192.0.2.77", Some(24)), Some(net("192.0.2.0/24")));
        assert_eq!(address_network("2001:db8::1", Some(48)), Some(net("2001:db8::/48")));
        assert_eq!(address_network("garbage", None), None);
    }
}
