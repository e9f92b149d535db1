use super::ber::{self, tag, BerError, Reader};
use super::value::{Oid, Value};
use serde::{Deserialize, Serialize};

/// Protocol version. Both variants use community authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    #[default]
    V2c,
}

impl SnmpVersion {
    fn wire(self) -> i64 {
        match self {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
        }
    }

    fn from_wire(v: i64) -> Option<Self> {
        match v {
            0 => Some(SnmpVersion::V1),
            1 => Some(SnmpVersion::V2c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    GetNextRequest,
    GetResponse,
}

impl PduKind {
    fn tag(self) -> u8 {
        match self {
            PduKind::GetRequest => tag::GET_REQUEST,
            PduKind::GetNextRequest => tag::GET_NEXT_REQUEST,
            PduKind::GetResponse => tag::GET_RESPONSE,
        }
    }

    fn from_tag(t: u8) -> Option<Self> {
        match t {
            tag::GET_REQUEST => Some(PduKind::GetRequest),
            tag::GET_NEXT_REQUEST => Some(PduKind::GetNextRequest),
            tag::GET_RESPONSE => Some(PduKind::GetResponse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: SnmpVersion,
    pub community: String,
    pub pdu: Pdu,
}

impl Message {
    pub fn get_request(version: SnmpVersion, community: &str, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            version,
            community: community.to_string(),
            pdu: Pdu {
                kind: PduKind::GetRequest,
                request_id,
                error_status: 0,
                error_index: 0,
                varbinds: oids
                    .iter()
                    .map(|oid| VarBind { oid: oid.clone(), value: Value::Null })
                    .collect(),
            },
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, BerError> {
        let mut bindings = Vec::new();
        for vb in &self.pdu.varbinds {
            let mut binding = Vec::new();
            ber::write_tlv(&mut binding, tag::OBJECT_IDENTIFIER, &vb.oid.encode()?);
            vb.value.write(&mut binding)?;
            ber::write_tlv(&mut bindings, tag::SEQUENCE, &binding);
        }

        let mut pdu = Vec::new();
        ber::write_tlv(&mut pdu, tag::INTEGER, &ber::encode_integer(i64::from(self.pdu.request_id)));
        ber::write_tlv(&mut pdu, tag::INTEGER, &ber::encode_integer(i64::from(self.pdu.error_status)));
        ber::write_tlv(&mut pdu, tag::INTEGER, &ber::encode_integer(i64::from(self.pdu.error_index)));
        ber::write_tlv(&mut pdu, tag::SEQUENCE, &bindings);

        let mut body = Vec::new();
        ber::write_tlv(&mut body, tag::INTEGER, &ber::encode_integer(self.version.wire()));
        ber::write_tlv(&mut body, tag::OCTET_STRING, self.community.as_bytes());
        ber::write_tlv(&mut body, self.pdu.kind.tag(), &pdu);

        let mut out = Vec::with_capacity(body.len() + 4);
        ber::write_tlv(&mut out, tag::SEQUENCE, &body);
        Ok(out)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, BerError> {
        let mut outer = Reader::new(buf);
        let body = outer.expect(tag::SEQUENCE)?;
        if !outer.is_empty() {
            return Err(BerError::TrailingBytes(outer.remaining()));
        }

        let mut body = Reader::new(body);
        let raw_version = body.read_integer()?;
        let version = SnmpVersion::from_wire(raw_version).ok_or(BerError::UnsupportedVersion(raw_version))?;
        let community = String::from_utf8_lossy(body.expect(tag::OCTET_STRING)?).into_owned();

        let (pdu_tag, pdu_content) = body.read_tlv()?;
        let kind = PduKind::from_tag(pdu_tag).ok_or(BerError::UnsupportedTag(pdu_tag))?;
        let mut pdu = Reader::new(pdu_content);
        let request_id = to_i32(pdu.read_integer()?)?;
        let error_status = to_i32(pdu.read_integer()?)?;
        let error_index = to_i32(pdu.read_integer()?)?;

        let mut list = Reader::new(pdu.expect(tag::SEQUENCE)?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut binding = Reader::new(list.expect(tag::SEQUENCE)?);
            let oid = Oid::from_slice(&ber::decode_oid(binding.expect(tag::OBJECT_IDENTIFIER)?)?);
            let value = Value::read_lenient(&mut binding)?;
            varbinds.push(VarBind { oid, value });
        }

        Ok(Self {
            version,
            community,
            pdu: Pdu { kind, request_id, error_status, error_index, varbinds },
        })
    }
}

fn to_i32(v: i64) -> Result<i32, BerError> {
    i32::try_from(v).map_err(|_| BerError::IntegerOverflow)
}
