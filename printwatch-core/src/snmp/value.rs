use super::ber::{self, tag, BerError, Reader};
use std::fmt;
use std::str::FromStr;

/// Object identifier as a list of arcs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn encode(&self) -> Result<Vec<u8>, BerError> {
        ber::encode_oid(&self.0)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = BerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim()
            .trim_start_matches('.')
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| BerError::BadOid))
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 {
            return Err(BerError::BadOid);
        }
        Ok(Self(arcs))
    }
}

/// A varbind value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// A TLV this codec could not turn into a value; kept so the rest of the
    /// response survives.
    Undecodable { tag: u8, bytes: Vec<u8> },
}

impl Value {
    /// Numeric view used by status decoders. Unsigned application types are
    /// accepted alongside INTEGER since some agents report enums as Gauge32.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
            _ => None,
        }
    }

    /// True for the v2c exception markers and NULL, i.e. "no data for this OID".
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<(), BerError> {
        match self {
            Value::Integer(v) => ber::write_tlv(out, tag::INTEGER, &ber::encode_integer(*v)),
            Value::OctetString(bytes) => ber::write_tlv(out, tag::OCTET_STRING, bytes),
            Value::Null => ber::write_tlv(out, tag::NULL, &[]),
            Value::ObjectId(oid) => ber::write_tlv(out, tag::OBJECT_IDENTIFIER, &oid.encode()?),
            Value::IpAddress(octets) => ber::write_tlv(out, tag::IP_ADDRESS, octets),
            Value::Counter32(v) => ber::write_tlv(out, tag::COUNTER32, &ber::encode_unsigned(u64::from(*v))),
            Value::Gauge32(v) => ber::write_tlv(out, tag::GAUGE32, &ber::encode_unsigned(u64::from(*v))),
            Value::TimeTicks(v) => ber::write_tlv(out, tag::TIMETICKS, &ber::encode_unsigned(u64::from(*v))),
            Value::Opaque(bytes) => ber::write_tlv(out, tag::OPAQUE, bytes),
            Value::Counter64(v) => ber::write_tlv(out, tag::COUNTER64, &ber::encode_unsigned(*v)),
            Value::NoSuchObject => ber::write_tlv(out, tag::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => ber::write_tlv(out, tag::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => ber::write_tlv(out, tag::END_OF_MIB_VIEW, &[]),
            Value::Undecodable { tag, bytes } => ber::write_tlv(out, *tag, bytes),
        }
        Ok(())
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, BerError> {
        let (t, content) = reader.read_tlv()?;
        Self::from_tlv(t, content)
    }

    /// Like `read`, but a well-framed TLV with bad content becomes
    /// `Undecodable` instead of an error.
    pub fn read_lenient(reader: &mut Reader<'_>) -> Result<Self, BerError> {
        let (t, content) = reader.read_tlv()?;
        Ok(Self::from_tlv(t, content).unwrap_or_else(|_| Value::Undecodable {
            tag: t,
            bytes: content.to_vec(),
        }))
    }

    pub fn from_tlv(t: u8, content: &[u8]) -> Result<Self, BerError> {
        let value = match t {
            tag::INTEGER => Value::Integer(ber::decode_integer(content)?),
            tag::OCTET_STRING => Value::OctetString(content.to_vec()),
            tag::NULL => Value::Null,
            tag::OBJECT_IDENTIFIER => Value::ObjectId(Oid(ber::decode_oid(content)?)),
            tag::IP_ADDRESS => {
                let octets: [u8; 4] = content.try_into().map_err(|_| BerError::BadLength)?;
                Value::IpAddress(octets)
            }
            tag::COUNTER32 => Value::Counter32(decode_u32(content)?),
            tag::GAUGE32 => Value::Gauge32(decode_u32(content)?),
            tag::TIMETICKS => Value::TimeTicks(decode_u32(content)?),
            tag::OPAQUE => Value::Opaque(content.to_vec()),
            tag::COUNTER64 => Value::Counter64(ber::decode_unsigned(content)?),
            tag::NO_SUCH_OBJECT => Value::NoSuchObject,
            tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
            tag::END_OF_MIB_VIEW => Value::EndOfMibView,
            other => return Err(BerError::UnsupportedTag(other)),
        };
        Ok(value)
    }
}

fn decode_u32(content: &[u8]) -> Result<u32, BerError> {
    u32::try_from(ber::decode_unsigned(content)?).map_err(|_| BerError::IntegerOverflow)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Null => f.write_str("null"),
            Value::ObjectId(oid) => write!(f, "{oid}"),
            Value::IpAddress([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}"),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => write!(f, "{v}"),
            Value::Opaque(bytes) => write!(f, "opaque({} bytes)", bytes.len()),
            Value::Counter64(v) => write!(f, "{v}"),
            Value::NoSuchObject => f.write_str("noSuchObject"),
            Value::NoSuchInstance => f.write_str("noSuchInstance"),
            Value::EndOfMibView => f.write_str("endOfMibView"),
            Value::Undecodable { tag, bytes } => write!(f, "undecodable(tag {tag:#04x}, {} bytes)", bytes.len()),
        }
    }
}
