use super::ber::BerError;
use super::message::{Message, PduKind, SnmpVersion, VarBind};
use super::value::Oid;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// Largest datagram we accept; printer responses are far below this.
const MAX_DATAGRAM: usize = 65_507;

static NEXT_REQUEST_ID: AtomicU32 = AtomicU32::new(1);

fn next_request_id() -> i32 {
    (NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF) as i32
}

#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("could not resolve {0} to an IPv4 address")]
    Unresolvable(String),
    #[error("no response after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
    #[error("agent returned error-status {status} (index {index})")]
    ErrorStatus { status: i32, index: i32 },
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed packet: {0}")]
    Codec(#[from] BerError),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub port: u16,
    pub version: SnmpVersion,
    pub timeout: Duration,
    pub retries: u32,
}

/// One UDP association with a single agent.
///
/// The socket is owned by the session; dropping the session (including when a
/// surrounding future is cancelled) releases it.
pub struct SnmpSession {
    socket: UdpSocket,
    target: SocketAddr,
    community: String,
    options: SessionOptions,
}

impl SnmpSession {
    pub async fn open(host: &str, community: &str, options: SessionOptions) -> Result<Self, SnmpError> {
        let target = resolve_ipv4(host, options.port).await?;
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        // A connected socket surfaces ICMP port-unreachable as ConnectionRefused.
        socket.connect(target).await?;
        debug!(%target, "snmp session opened");
        Ok(Self {
            socket,
            target,
            community: community.to_string(),
            options,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// GetRequest for `oids`, retried `retries` times after the first attempt.
    pub async fn get(&mut self, oids: &[Oid]) -> Result<Vec<VarBind>, SnmpError> {
        let request_id = next_request_id();
        let request = Message::get_request(self.options.version, &self.community, request_id, oids).encode()?;
        let attempts = self.options.retries + 1;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        for attempt in 1..=attempts {
            self.socket.send(&request).await?;
            trace!(target_addr = %self.target, request_id, attempt, "get request sent");

            let deadline = Instant::now() + self.options.timeout;
            loop {
                let received = match timeout_at(deadline, self.socket.recv(&mut buf)).await {
                    Ok(result) => result?,
                    Err(_) => break,
                };
                let response = match Message::decode(&buf[..received]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(target_addr = %self.target, error = %e, "discarding undecodable datagram");
                        continue;
                    }
                };
                if response.pdu.kind != PduKind::GetResponse || response.pdu.request_id != request_id {
                    trace!(target_addr = %self.target, got = response.pdu.request_id, "discarding unrelated response");
                    continue;
                }
                if response.pdu.error_status != 0 {
                    return Err(SnmpError::ErrorStatus {
                        status: response.pdu.error_status,
                        index: response.pdu.error_index,
                    });
                }
                return Ok(response.pdu.varbinds);
            }
        }

        Err(SnmpError::Timeout { attempts })
    }

    pub fn close(self) {
        debug!(target_addr = %self.target, "snmp session closed");
    }
}

async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, SnmpError> {
    let host = host.trim();
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|_| SnmpError::Unresolvable(host.to_string()))?;
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| SnmpError::Unresolvable(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::message::Pdu;
    use crate::snmp::value::Value;

    fn options(port: u16) -> SessionOptions {
        SessionOptions {
            port,
            version: SnmpVersion::V2c,
            timeout: Duration::from_millis(300),
            retries: 0,
        }
    }

    #[tokio::test]
    async fn ipv6_literals_are_not_targets() {
        let err = SnmpSession::open("::1", "public", options(161)).await.err().unwrap();
        assert!(matches!(err, SnmpError::Unresolvable(_)));
    }

    #[tokio::test]
    async fn ignores_responses_for_other_requests() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = agent.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            let (n, peer) = agent.recv_from(&mut buf).await.unwrap();
            let request = Message::decode(&buf[..n]).unwrap();
            let reply = |request_id: i32, text: &str| Message {
                version: request.version,
                community: request.community.clone(),
                pdu: Pdu {
                    kind: PduKind::GetResponse,
                    request_id,
                    error_status: 0,
                    error_index: 0,
                    varbinds: vec![VarBind {
                        oid: request.pdu.varbinds[0].oid.clone(),
                        value: Value::OctetString(text.as_bytes().to_vec()),
                    }],
                },
            };
            let stale = reply(request.pdu.request_id.wrapping_add(1000), "stale").encode().unwrap();
            let fresh = reply(request.pdu.request_id, "fresh").encode().unwrap();
            agent.send_to(&stale, peer).await.unwrap();
            agent.send_to(&fresh, peer).await.unwrap();
        });

        let mut session = SnmpSession::open("127.0.0.1", "public", options(port)).await.unwrap();
        let oid: Oid = "1.3.6.1.2.1.1.1.0".parse().unwrap();
        let varbinds = session.get(&[oid]).await.unwrap();
        assert_eq!(varbinds[0].value.as_text().as_deref(), Some("fresh"));
        session.close();
    }

    #[tokio::test]
    async fn silent_agent_times_out_after_all_attempts() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = agent.local_addr().unwrap().port();
        let mut opts = options(port);
        opts.timeout = Duration::from_millis(50);
        opts.retries = 2;

        let mut session = SnmpSession::open("127.0.0.1", "public", opts).await.unwrap();
        let oid: Oid = "1.3.6.1.2.1.1.1.0".parse().unwrap();
        let err = session.get(&[oid]).await.unwrap_err();
        assert!(matches!(err, SnmpError::Timeout { attempts: 3 }));
        drop(agent);
    }
}
