//! Minimal BER reader/writer covering the subset of ASN.1 used by SNMP v1/v2c.
//!
//! Only definite lengths are supported. Integers are two's complement big-endian
//! with the shortest encoding; application types (Counter32, Gauge32, TimeTicks,
//! Counter64) are unsigned and carry a leading zero octet when the high bit is set.

use thiserror::Error;

pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;

    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const GET_RESPONSE: u8 = 0xA2;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("unexpected end of input")]
    Truncated,
    #[error("expected tag 0x{expected:02x}, found 0x{found:02x}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("unsupported length encoding")]
    BadLength,
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,
    #[error("malformed object identifier")]
    BadOid,
    #[error("unsupported value tag 0x{0:02x}")]
    UnsupportedTag(u8),
    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
    #[error("{0} trailing byte(s) after message")]
    TrailingBytes(usize),
}

pub type Result<T> = std::result::Result<T, BerError>;

pub fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

pub fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

pub fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Drop redundant sign octets, keeping the sign bit of the next octet intact.
    while start < bytes.len() - 1 {
        let (cur, next) = (bytes[start], bytes[start + 1]);
        if (cur == 0x00 && next & 0x80 == 0) || (cur == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

pub fn encode_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    let mut out = Vec::with_capacity(9);
    if bytes[start] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[start..]);
    out
}

pub fn encode_oid(arcs: &[u32]) -> Result<Vec<u8>> {
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return Err(BerError::BadOid);
    }
    let first = arcs[0]
        .checked_mul(40)
        .and_then(|v| v.checked_add(arcs[1]))
        .ok_or(BerError::BadOid)?;
    let mut out = Vec::with_capacity(arcs.len() + 4);
    push_base128(&mut out, first);
    for arc in &arcs[2..] {
        push_base128(&mut out, *arc);
    }
    Ok(out)
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len() - 1;
    tmp[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        tmp[i] = (value & 0x7F) as u8 | 0x80;
        value >>= 7;
    }
    out.extend_from_slice(&tmp[i..]);
}

pub fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() {
        return Err(BerError::BadLength);
    }
    if content.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    let mut value: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    for b in content {
        value = (value << 8) | i64::from(*b);
    }
    Ok(value)
}

pub fn decode_unsigned(content: &[u8]) -> Result<u64> {
    if content.is_empty() {
        return Err(BerError::BadLength);
    }
    let significant = match content.iter().position(|b| *b != 0) {
        Some(i) => &content[i..],
        None => return Ok(0),
    };
    if significant.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    Ok(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

pub fn decode_oid(content: &[u8]) -> Result<Vec<u32>> {
    if content.is_empty() {
        return Err(BerError::BadOid);
    }
    let mut subids = Vec::with_capacity(content.len() + 1);
    let mut acc: u32 = 0;
    let mut pending = false;
    for b in content {
        if acc > (u32::MAX >> 7) {
            return Err(BerError::BadOid);
        }
        acc = (acc << 7) | u32::from(b & 0x7F);
        pending = b & 0x80 != 0;
        if !pending {
            subids.push(acc);
            acc = 0;
        }
    }
    if pending {
        return Err(BerError::BadOid);
    }

    let first = subids[0];
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(subids.len() + 1);
    arcs.push(a);
    arcs.push(b);
    arcs.extend_from_slice(&subids[1..]);
    Ok(arcs)
}

/// Cursor over a BER buffer yielding tag/content pairs.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self.buf.get(self.pos).ok_or(BerError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        // 0x80 is the indefinite form, which SNMP never uses.
        if count == 0 || count > 4 {
            return Err(BerError::BadLength);
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(self.byte()?);
        }
        Ok(len)
    }

    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self.pos.checked_add(len).ok_or(BerError::BadLength)?;
        if end > self.buf.len() {
            return Err(BerError::Truncated);
        }
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    pub fn expect(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (found, content) = self.read_tlv()?;
        if found != expected {
            return Err(BerError::UnexpectedTag { expected, found });
        }
        Ok(content)
    }

    pub fn read_integer(&mut self) -> Result<i64> {
        decode_integer(self.expect(tag::INTEGER)?)
    }
}
