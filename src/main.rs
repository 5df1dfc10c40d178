use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use spf_flattener::args::LogLevel;
use spf_flattener::config::FlattenConfig;
use spf_flattener::constants::{
    DEFAULT_DNS_ATTEMPTS, DEFAULT_DNS_TIMEOUT_SECS, DEFAULT_NAMESERVERS, GANDI_APIKEY_ENV,
    GANDI_API_URL, MAX_INCLUDE_DEPTH,
};
use spf_flattener::crawler::flatten_providers;
use spf_flattener::fetcher::DnsFetcher;
use spf_flattener::formatter::{self, segment_count, spf_record};
use spf_flattener::logger::init_logger;
use spf_flattener::record::DomainName;
use spf_flattener::store::file::FileSource;
use spf_flattener::store::gandi::GandiClient;
use spf_flattener::store::{sync_domain, DryRun, RecordSink, RecordSource};

#[derive(Parser)]
#[command(name = "spf-flattener")]
#[command(about = "Flatten SPF records using Gandi's LiveDNS API")]
struct Cli {
    /// Domains you own whose TXT record for SPF is updated
    #[arg(short, long, value_name = "DOMAIN", required = true, num_args = 1..)]
    domain: Vec<DomainName>,

    /// SPF domains of the e-mail providers to include in the record
    #[arg(short, long, value_name = "DOMAIN", required = true, num_args = 1..)]
    email_providers: Vec<DomainName>,

    /// Gandi API key
    #[arg(short = 'k', long, env = GANDI_APIKEY_ENV, hide_env_values = true)]
    apikey: Option<String>,

    /// DNS servers used to resolve the providers' records
    #[arg(
        short = 'r',
        long = "dns",
        value_name = "IP",
        num_args = 1..,
        default_values_t = DEFAULT_NAMESERVERS
    )]
    dns: Vec<IpAddr>,

    /// Log level
    #[arg(short, long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// JSON file to read the TXT records from instead of calling the API
    #[arg(short = 'L', long, value_name = "FILE")]
    load: Option<String>,

    /// Only log the update that would be sent
    #[arg(short = 'K', long)]
    dry_run: bool,

    /// DNS query timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_DNS_TIMEOUT_SECS)]
    timeout: u64,

    /// DNS query attempts per nameserver
    #[arg(long, value_name = "N", default_value_t = DEFAULT_DNS_ATTEMPTS)]
    attempts: usize,

    /// Maximum include/redirect nesting
    #[arg(long, value_name = "N", default_value_t = MAX_INCLUDE_DEPTH)]
    max_depth: usize,

    /// LiveDNS API base URL
    #[arg(long, value_name = "URL", default_value = GANDI_API_URL)]
    api_url: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level.into()).context("cannot initialize logger")?;
    log::debug!(
        "Domains: {:?}, providers: {:?}, nameservers: {:?}",
        cli.domain,
        cli.email_providers,
        cli.dns
    );

    let config = FlattenConfig::new(cli.dns.clone())?
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_attempts(cli.attempts)?
        .with_max_depth(cli.max_depth);

    let client = match cli.apikey.as_deref() {
        Some(key) => Some(GandiClient::new(key)?.with_base_url(&cli.api_url)),
        None if cli.load.is_some() && cli.dry_run => None,
        None => bail!("no API key: pass --apikey or set {GANDI_APIKEY_ENV}"),
    };

    let fetcher = DnsFetcher::new(&config)?;
    let ips = flatten_providers(&fetcher, &cli.email_providers, &config)?;
    let record = spf_record(&formatter::format(&ips));
    log::info!(
        "Flattened record has {} networks in {} TXT segment(s)",
        ips.len(),
        segment_count(&record)
    );

    let file_source = cli.load.as_ref().map(FileSource::new);
    let source: &dyn RecordSource = match (&file_source, &client) {
        (Some(file), _) => file,
        (None, Some(client)) => client,
        (None, None) => bail!("no TXT record source"),
    };
    let dry_run = DryRun::new(&cli.api_url);
    let sink: &dyn RecordSink = match (&client, cli.dry_run) {
        (Some(client), false) => client,
        _ => &dry_run,
    };

    for domain in &cli.domain {
        sync_domain(source, sink, domain, &record)
            .with_context(|| format!("cannot update TXT records of {domain}"))?;
    }
    Ok(())
}
