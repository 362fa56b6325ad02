//! Simulated port scanner.
//!
//! Nothing is sent on the wire: the target is resolved, then every port gets a
//! made up status after a fixed delay. The outcome is a hash of the seed, the
//! address and the port, so the same scan always yields the same table.

use std::{
    fmt,
    net::IpAddr,
    str::FromStr,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail};
use log::debug;

/// Most ports scanned in one run.
pub const MAX_PORTS: usize = 100;

/// Most ports expanded from a `low-high` range.
pub const MAX_RANGE: u32 = 1000;

const COMMON_OPEN_PORTS: [u16; 5] = [22, 80, 443, 3306, 8080];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScanType {
    /// TCP SYN.
    #[default]
    Tcp,
    Udp,
    /// Full TCP connect.
    Full,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanType::Tcp => "TCP SYN",
            ScanType::Udp => "UDP",
            ScanType::Full => "Full Connect",
        })
    }
}

impl FromStr for ScanType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "syn" => Ok(ScanType::Tcp),
            "udp" => Ok(ScanType::Udp),
            "full" | "connect" => Ok(ScanType::Full),
            _ => bail!("unknown scan type {s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortStatus::Open => "open",
            PortStatus::Closed => "closed",
            PortStatus::Filtered => "filtered",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub address: IpAddr,
    pub port: u16,
    pub service: &'static str,
    pub status: PortStatus,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub scan_type: ScanType,
    pub results: Vec<ScanResult>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn count(&self, status: PortStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// `<target> [<scan type>] [<ports>]`, as typed in the scanner form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: String,
    pub scan_type: ScanType,
    pub ports: String,
}

impl FromStr for ScanRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace().peekable();
        let target = words
            .next()
            .ok_or_else(|| anyhow!("target is required"))?
            .to_owned();

        let scan_type = match words.peek().map(|word| word.parse::<ScanType>()) {
            Some(Ok(scan_type)) => {
                words.next();
                scan_type
            }
            _ => ScanType::default(),
        };

        let ports = words.collect::<Vec<_>>().join(" ");
        let request = ScanRequest {
            target,
            scan_type,
            ports: if ports.is_empty() {
                "1-1000".to_owned()
            } else {
                ports
            },
        };

        Ok(request)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    delay: Duration,
    seed: u64,
}

impl Scanner {
    pub fn new(delay: Duration, seed: u64) -> Self {
        Self { delay, seed }
    }

    pub async fn scan(self, request: ScanRequest) -> Result<ScanReport, anyhow::Error> {
        let started = Instant::now();
        let address = resolve(&request.target).await?;

        let ports = parse_ports(&request.ports);
        if ports.is_empty() {
            bail!("invalid port range specified");
        }

        debug!(
            "{} scan of {} ({}) on {} ports",
            request.scan_type,
            request.target,
            address,
            ports.len().min(MAX_PORTS)
        );
        tokio::time::sleep(self.delay).await;

        let results = ports
            .into_iter()
            .take(MAX_PORTS)
            .map(|port| ScanResult {
                address,
                port,
                service: service_name(port),
                status: self.status(address, port),
            })
            .collect();

        Ok(ScanReport {
            target: request.target,
            scan_type: request.scan_type,
            results,
            elapsed: started.elapsed(),
        })
    }

    fn status(&self, address: IpAddr, port: u16) -> PortStatus {
        let draw = fxhash::hash64(&(self.seed, address, port)) % 100;

        if COMMON_OPEN_PORTS.contains(&port) {
            if draw < 80 {
                PortStatus::Open
            } else {
                PortStatus::Closed
            }
        } else if draw < 20 {
            PortStatus::Open
        } else if draw < 50 {
            PortStatus::Filtered
        } else {
            PortStatus::Closed
        }
    }
}

async fn resolve(target: &str) -> Result<IpAddr, anyhow::Error> {
    if let Ok(addr) = target.parse::<IpAddr>() {
        return Ok(addr);
    }

    let host = target.to_owned();
    let addrs = tokio::task::spawn_blocking(move || dns_lookup::lookup_host(&host)).await?;

    addrs
        .ok()
        .and_then(|addrs| addrs.into_iter().next())
        .ok_or_else(|| anyhow!("could not resolve hostname: {target}"))
}

/// Expands a port specification: `22,80,443`, `1-1000` or `8080`.
///
/// Invalid list entries are skipped, a range is cut to [`MAX_RANGE`] ports.
pub fn parse_ports(ports: &str) -> Vec<u16> {
    let ports = ports.trim();

    if ports.contains(',') {
        return ports.split(',').filter_map(port_number).collect();
    }

    if let Some((start, end)) = ports.split_once('-') {
        return match (port_number(start), port_number(end)) {
            (Some(start), Some(end)) if start <= end => {
                let end = end.min(start.saturating_add((MAX_RANGE - 1) as u16));
                (start..=end).collect()
            }
            _ => Vec::new(),
        };
    }

    port_number(ports).into_iter().collect()
}

fn port_number(s: &str) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|port| *port != 0)
}

pub fn service_name(port: u16) -> &'static str {
    match port {
        20 => "FTP Data",
        21 => "FTP Control",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        143 => "IMAP",
        443 => "HTTPS",
        465 => "SMTPS",
        587 => "SMTP Submission",
        993 => "IMAPS",
        995 => "POP3S",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        8080 => "HTTP Alternate",
        8443 => "HTTPS Alternate",
        _ => "Unknown",
    }
}
