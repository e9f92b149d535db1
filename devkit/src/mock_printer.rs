/*!
Mock SNMP printer for tests without hardware.

Answers GetRequests from a fixed OID table using the core codec, records every
request it accepts, and can be told to stay silent for chosen OIDs to simulate
a device that hangs mid-probe.
*/

use anyhow::{Context, Result};
use printwatch_core::oid;
use printwatch_core::snmp::{Message, Oid, Pdu, PduKind, SnmpVersion, Value, VarBind};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// noSuchName, the v1 answer for an unknown OID.
const NO_SUCH_NAME: i32 = 2;

/// What the mock printer knows and how it misbehaves.
#[derive(Debug, Clone)]
pub struct PrinterProfile {
    community: String,
    values: HashMap<Oid, Value>,
    silent_on: HashSet<Oid>,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self {
            community: "public".to_string(),
            values: HashMap::new(),
            silent_on: HashSet::new(),
        }
    }
}

impl PrinterProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic network printer, running, no error bits.
    pub fn healthy(descr: &str) -> Self {
        Self::new()
            .sys_descr(descr)
            .uptime_ticks(2 * 8_640_000 + 3 * 360_000)
            .device_status(2)
            .error_state(0)
    }

    pub fn community(mut self, community: &str) -> Self {
        self.community = community.to_string();
        self
    }

    pub fn with(mut self, arcs: &[u32], value: Value) -> Self {
        self.values.insert(Oid::from_slice(arcs), value);
        self
    }

    pub fn sys_descr(self, descr: &str) -> Self {
        self.with(oid::SYS_DESCR, Value::OctetString(descr.as_bytes().to_vec()))
    }

    pub fn uptime_ticks(self, ticks: u32) -> Self {
        self.with(oid::SYS_UPTIME, Value::TimeTicks(ticks))
    }

    pub fn device_status(self, code: i64) -> Self {
        self.with(oid::HR_DEVICE_STATUS, Value::Integer(code))
    }

    pub fn printer_status(self, code: i64) -> Self {
        self.with(oid::HR_PRINTER_STATUS, Value::Integer(code))
    }

    pub fn error_state(self, code: i64) -> Self {
        self.with(oid::HR_PRINTER_DETECTED_ERROR_STATE, Value::Integer(code))
    }

    pub fn toner(self, level: i64, max: i64) -> Self {
        self.with(oid::PRT_MARKER_SUPPLIES_TYPE, Value::Integer(3))
            .with(oid::PRT_MARKER_SUPPLIES_DESCRIPTION, Value::OctetString(b"Black Toner".to_vec()))
            .with(oid::PRT_MARKER_SUPPLIES_MAX_CAPACITY, Value::Integer(max))
            .with(oid::PRT_MARKER_SUPPLIES_LEVEL, Value::Integer(level))
    }

    /// Requests that mention this OID are received but never answered.
    pub fn silent_on(mut self, arcs: &[u32]) -> Self {
        self.silent_on.insert(Oid::from_slice(arcs));
        self
    }

    fn answer(&self, request: &Message) -> Option<Message> {
        if request.community != self.community || request.pdu.kind != PduKind::GetRequest {
            return None;
        }
        if request.pdu.varbinds.iter().any(|vb| self.silent_on.contains(&vb.oid)) {
            return None;
        }

        let mut error_status = 0;
        let mut error_index = 0;
        let mut varbinds = Vec::with_capacity(request.pdu.varbinds.len());
        for (i, vb) in request.pdu.varbinds.iter().enumerate() {
            let value = match self.values.get(&vb.oid) {
                Some(v) => v.clone(),
                None if request.version == SnmpVersion::V1 => {
                    if error_status == 0 {
                        error_status = NO_SUCH_NAME;
                        error_index = i as i32 + 1;
                    }
                    Value::Null
                }
                None => Value::NoSuchInstance,
            };
            varbinds.push(VarBind { oid: vb.oid.clone(), value });
        }

        Some(Message {
            version: request.version,
            community: request.community.clone(),
            pdu: Pdu {
                kind: PduKind::GetResponse,
                request_id: request.pdu.request_id,
                error_status,
                error_index,
                varbinds,
            },
        })
    }
}

/// A running mock agent bound to 127.0.0.1 on an ephemeral port.
pub struct MockPrinter {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<Oid>>>>,
    task: JoinHandle<()>,
}

impl MockPrinter {
    pub async fn start(profile: PrinterProfile) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.context("bind mock printer")?;
        let addr = socket.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log_ref = requests.clone();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65_507];
            loop {
                let (n, peer) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "mock printer recv failed");
                        continue;
                    }
                };
                let request = match Message::decode(&buf[..n]) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(%peer, error = %e, "mock printer got an undecodable datagram");
                        continue;
                    }
                };
                if let Ok(mut log) = log_ref.lock() {
                    log.push(request.pdu.varbinds.iter().map(|vb| vb.oid.clone()).collect());
                }
                let Some(response) = profile.answer(&request) else {
                    debug!(request_id = request.pdu.request_id, "mock printer staying silent");
                    continue;
                };
                match response.encode() {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, peer).await {
                            warn!(%peer, error = %e, "mock printer send failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "mock printer could not encode its reply"),
                }
            }
        });

        info!(%addr, "mock printer listening");
        Ok(Self { addr, requests, task })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// OIDs of each request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Vec<Oid>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

impl Drop for MockPrinter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
