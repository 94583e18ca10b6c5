//! Name resolution through the cluster agents.
//!
//! Cluster-internal names (`leader.mesos` and friends) are only known to the
//! DNS service running on the agents. Names under the configured TLD are sent
//! as plain A queries to each agent in turn; everything else goes through the
//! system resolver.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

pub const DNS_PORT: u16 = 53;
const QUERY_TIMEOUT: Duration = Duration::from_secs(2);
const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const MAX_RESPONSE: usize = 512;

static NEXT_QUERY_ID: AtomicU16 = AtomicU16::new(0x4d43);

#[derive(Debug, Clone)]
pub struct AgentDnsResolver {
    agents: Vec<IpAddr>,
    tld: String,
    port: u16,
    timeout: Duration,
}

impl AgentDnsResolver {
    pub fn new(agents: Vec<IpAddr>, tld: impl Into<String>) -> Self {
        let tld = tld.into();
        let tld = if tld.starts_with('.') || tld.is_empty() {
            tld
        } else {
            format!(".{}", tld)
        };
        Self {
            agents,
            tld: tld.to_ascii_lowercase(),
            port: DNS_PORT,
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `host` should be answered by the agents
    pub fn is_cluster_name(&self, host: &str) -> bool {
        if self.agents.is_empty() || self.tld.is_empty() {
            return false;
        }
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host.ends_with(&self.tld) || format!(".{}", host) == self.tld
    }

    /// Resolve `host`, asking the agents first for cluster names.
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        if self.is_cluster_name(host) {
            match self.query_agents(host).await {
                Ok(addrs) => return Ok(addrs),
                Err(err) => warn!(host, error = %err, "Agent DNS lookup failed, using system resolver"),
            }
        }
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .with_context(|| format!("Failed to resolve {}", host))?
            .map(|addr| addr.ip())
            .collect();
        Ok(addrs)
    }

    async fn query_agents(&self, host: &str) -> Result<Vec<IpAddr>> {
        let mut last_error = anyhow!("no agents configured");
        for agent in &self.agents {
            let server = SocketAddr::new(*agent, self.port);
            match tokio::time::timeout(self.timeout, query(server, host)).await {
                Ok(Ok(addrs)) if !addrs.is_empty() => {
                    debug!(host, %server, count = addrs.len(), "Resolved via agent");
                    return Ok(addrs.into_iter().map(IpAddr::V4).collect());
                }
                Ok(Ok(_)) => last_error = anyhow!("{} has no A records for {}", server, host),
                Ok(Err(err)) => last_error = err,
                Err(_) => last_error = anyhow!("query to {} timed out", server),
            }
        }
        Err(last_error)
    }
}

impl Resolve for AgentDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addrs = resolver.lookup(name.as_str()).await?;
            let addrs: Addrs = Box::new(addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

async fn query(server: SocketAddr, host: &str) -> Result<Vec<Ipv4Addr>> {
    let bind: SocketAddr = if server.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = UdpSocket::bind(bind).await.context("Failed to bind UDP socket")?;
    socket.connect(server).await?;

    let id = NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed);
    socket.send(&encode_query(id, host)?).await?;

    let mut buf = [0u8; MAX_RESPONSE];
    let len = socket.recv(&mut buf).await?;
    parse_response(id, &buf[..len])
}

/// Encode a recursive A query for `host`.
pub fn encode_query(id: u16, host: &str) -> Result<Vec<u8>> {
    let mut packet = Vec::with_capacity(host.len() + 18);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&0x0100u16.to_be_bytes());
    packet.extend_from_slice(&1u16.to_be_bytes());
    packet.extend_from_slice(&[0; 6]);

    for label in host.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            bail!("invalid DNS name '{}'", host);
        }
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&TYPE_A.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(packet)
}

fn read_u16(packet: &[u8], at: usize) -> Result<u16> {
    packet
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| anyhow!("truncated DNS response"))
}

/// Offset just past the (possibly compressed) name starting at `at`.
fn skip_name(packet: &[u8], mut at: usize) -> Result<usize> {
    loop {
        let len = *packet.get(at).ok_or_else(|| anyhow!("truncated DNS name"))?;
        match len {
            0 => return Ok(at + 1),
            l if l & 0xC0 == 0xC0 => return Ok(at + 2),
            l => at += 1 + l as usize,
        }
    }
}

/// Extract the A records from a response to query `id`.
pub fn parse_response(id: u16, packet: &[u8]) -> Result<Vec<Ipv4Addr>> {
    if read_u16(packet, 0)? != id {
        bail!("DNS response id mismatch");
    }
    let flags = read_u16(packet, 2)?;
    if flags & 0x8000 == 0 {
        bail!("DNS packet is not a response");
    }
    let rcode = flags & 0x000F;
    if rcode != 0 {
        bail!("DNS server answered with rcode {}", rcode);
    }
    let questions = read_u16(packet, 4)?;
    let answers = read_u16(packet, 6)?;

    let mut at = 12;
    for _ in 0..questions {
        at = skip_name(packet, at)? + 4;
    }

    let mut addrs = Vec::new();
    for _ in 0..answers {
        at = skip_name(packet, at)?;
        let rtype = read_u16(packet, at)?;
        let class = read_u16(packet, at + 2)?;
        let rdlength = read_u16(packet, at + 8)? as usize;
        let rdata = packet
            .get(at + 10..at + 10 + rdlength)
            .ok_or_else(|| anyhow!("truncated DNS record"))?;
        if rtype == TYPE_A && class == CLASS_IN && rdlength == 4 {
            addrs.push(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]));
        }
        at += 10 + rdlength;
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_for(query: &[u8], ip: [u8; 4]) -> Vec<u8> {
        let mut response = query.to_vec();
        response[2..4].copy_from_slice(&0x8180u16.to_be_bytes());
        response[6..8].copy_from_slice(&1u16.to_be_bytes());
        // Compressed pointer back to the question name
        response.extend_from_slice(&[0xC0, 0x0C]);
        response.extend_from_slice(&TYPE_A.to_be_bytes());
        response.extend_from_slice(&CLASS_IN.to_be_bytes());
        response.extend_from_slice(&60u32.to_be_bytes());
        response.extend_from_slice(&4u16.to_be_bytes());
        response.extend_from_slice(&ip);
        response
    }

    #[test]
    fn query_encodes_labels() {
        let packet = encode_query(7, "leader.mesos").unwrap();
        assert_eq!(&packet[..4], &[0, 7, 1, 0]);
        assert_eq!(&packet[12..], b"\x06leader\x05mesos\x00\x00\x01\x00\x01");
        assert!(encode_query(1, "bad..name").is_err());
    }

    #[test]
    fn response_yields_a_records() {
        let query = encode_query(42, "leader.mesos").unwrap();
        let response = answer_for(&query, [10, 0, 0, 5]);
        assert_eq!(
            parse_response(42, &response).unwrap(),
            vec![Ipv4Addr::new(10, 0, 0, 5)]
        );
        assert!(parse_response(43, &response).is_err());
    }

    #[test]
    fn error_rcode_is_reported() {
        let query = encode_query(9, "missing.mesos").unwrap();
        let mut response = query.clone();
        response[2..4].copy_from_slice(&0x8183u16.to_be_bytes());
        assert!(parse_response(9, &response).is_err());
    }

    #[test]
    fn cluster_names_follow_tld() {
        let resolver = AgentDnsResolver::new(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)], "mesos");
        assert!(resolver.is_cluster_name("leader.mesos"));
        assert!(resolver.is_cluster_name("Marathon.Mesos."));
        assert!(!resolver.is_cluster_name("github.com"));
        assert!(!resolver.is_cluster_name("notmesos"));

        let no_agents = AgentDnsResolver::new(Vec::new(), ".mesos");
        assert!(!no_agents.is_cluster_name("leader.mesos"));
    }

    #[tokio::test]
    async fn lookup_asks_agent_for_cluster_names() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            let response = answer_for(&buf[..len], [10, 1, 2, 3]);
            server.send_to(&response, peer).await.unwrap();
        });

        let resolver = AgentDnsResolver::new(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)], ".mesos")
            .with_port(port);
        let addrs = resolver.lookup("leader.mesos").await.unwrap();
        assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))]);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn other_names_use_system_resolver() {
        let resolver = AgentDnsResolver::new(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)], ".mesos")
            .with_port(9)
            .with_timeout(Duration::from_millis(50));
        let addrs = resolver.lookup("127.0.0.1").await.unwrap();
        assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    }
}
