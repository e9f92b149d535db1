//! SNMP v1/v2c over UDP: BER codec, message model and a get-only session.

pub mod ber;
pub mod message;
pub mod session;
pub mod value;

pub use message::{Message, Pdu, PduKind, SnmpVersion, VarBind};
pub use session::{SessionOptions, SnmpError, SnmpSession};
pub use value::{Oid, Value};

/// Standard SNMP agent port.
pub const DEFAULT_PORT: u16 = 161;
