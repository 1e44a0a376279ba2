//! 3GPP TS 23.040 SMS-DELIVER PDU decoding.
//!
//! `parse_pdu` turns one hex-encoded PDU line (as returned by `AT+CMGL=0`)
//! into a [`PduRecord`]. Decode failures are typed per the error taxonomy
//! so the orchestrator can log-and-skip a bad record without aborting the
//! whole cycle.

use thiserror::Error;

use crate::codec::{self, TimestampError};

#[derive(Debug, Error)]
pub enum PduError {
    #[error("malformed hex PDU: {0}")]
    MalformedHex(String),
    #[error("truncated PDU: expected at least {needed} bytes at offset {at}, got {got}")]
    TruncatedPdu {
        at: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("unsupported data coding scheme: {0:#04x}")]
    UnsupportedDcs(u8),
    #[error("bad TP-SCTS timestamp: {0}")]
    BadTimestamp(#[from] TimestampError),
}

/// One Information Element from a User Data Header: `(iei, iedl, ied)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDataElement {
    pub iei: u8,
    pub ied: Vec<u8>,
}

/// The decoded form of one PDU line. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduRecord {
    pub smsc: Option<String>,
    pub msg_type_flags: u8,
    pub sender: String,
    pub tp_pid: u8,
    pub tp_dcs: u8,
    pub timestamp: String,
    pub udh: Option<Vec<UserDataElement>>,
    pub body: String,
}

impl PduRecord {
    /// Bit 6 of `msg_type_flags`: a User Data Header is present.
    pub fn udhi(&self) -> bool {
        self.msg_type_flags & 0b0100_0000 != 0
    }

    /// Bit 2 clear means more messages are queued on the modem.
    pub fn mms(&self) -> bool {
        self.msg_type_flags & 0b0000_0100 == 0
    }

    /// Find the concatenation IE, if any, switching on `iei` rather than a
    /// fixed slice width (see the open question recorded in DESIGN.md).
    pub fn concat_key(&self) -> Option<ConcatKey> {
        let udh = self.udh.as_ref()?;
        for elem in udh {
            match elem.iei {
                0x00 if elem.ied.len() >= 3 => {
                    return Some(ConcatKey {
                        reference: elem.ied[0] as u16,
                        total: elem.ied[1],
                        seq: elem.ied[2],
                    });
                }
                0x08 if elem.ied.len() >= 4 => {
                    return Some(ConcatKey {
                        reference: u16::from_be_bytes([elem.ied[0], elem.ied[1]]),
                        total: elem.ied[2],
                        seq: elem.ied[3],
                    });
                }
                _ => continue,
            }
        }
        None
    }
}

/// `(reference, total, seq)` derived from a concatenation UDH element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcatKey {
    pub reference: u16,
    pub total: u8,
    pub seq: u8,
}

fn hex_decode(line: &str) -> Result<Vec<u8>, PduError> {
    hex::decode(line.trim()).map_err(|e| PduError::MalformedHex(e.to_string()))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], PduError> {
        if self.pos + n > self.bytes.len() {
            return Err(PduError::TruncatedPdu {
                at: field,
                needed: n,
                got: self.bytes.len().saturating_sub(self.pos),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self, field: &'static str) -> Result<u8, PduError> {
        Ok(self.take(1, field)?[0])
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

/// Parse the User Data Header octets (already stripped of the leading UDHL
/// byte) into a sequence of `(iei, iedl, ied)` triples. An `iedl == 0` IE is
/// kept as an empty-payload element.
fn parse_udh(bytes: &[u8]) -> Vec<UserDataElement> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        let iei = bytes[i];
        let iedl = bytes[i + 1] as usize;
        let start = i + 2;
        let end = (start + iedl).min(bytes.len());
        out.push(UserDataElement {
            iei,
            ied: bytes[start..end].to_vec(),
        });
        i = end;
    }
    out
}

/// Parse one hex-encoded SMS-DELIVER PDU line into a [`PduRecord`].
pub fn parse_pdu(hex_line: &str) -> Result<PduRecord, PduError> {
    let data = hex_decode(hex_line)?;
    let mut c = Cursor::new(&data);

    let smsc_length = c.take_u8("smsc_length")? as usize;
    let smsc = if smsc_length > 0 {
        let toa_and_digits = c.take(smsc_length, "smsc_address")?;
        let digits = codec::semi_octet_to_string(&toa_and_digits[1..]);
        Some(digits.trim_end_matches('f').to_string())
    } else {
        None
    };

    let msg_type_flags = c.take_u8("msg_type_flags")?;

    let address_length = c.take_u8("address_length")? as usize;
    let _type_of_address = c.take_u8("sender_type_of_address")?;
    let sender_bytes_len = (address_length + 1) / 2;
    let sender_bytes = c.take(sender_bytes_len, "sender_number")?;
    // The filler nibble on an odd-length number is always `f`; strip every
    // occurrence rather than trust `address_length` to land exactly on it.
    let sender = codec::semi_octet_to_string(sender_bytes)
        .chars()
        .filter(|&ch| ch != 'f')
        .collect::<String>();

    let tp_pid = c.take_u8("tp_pid")?;
    let tp_dcs = c.take_u8("tp_dcs")?;
    let scts_bytes = c.take(7, "tp_scts")?;
    let timestamp = codec::decode_timestamp(scts_bytes)?;

    let tp_udl = c.take_u8("tp_udl")? as usize;
    let payload = c.rest();

    let udhi = msg_type_flags & 0b0100_0000 != 0;
    let (udh, udh_octet_len, content) = if udhi && !payload.is_empty() {
        let udhl = payload[0] as usize;
        let udh_octet_len = 1 + udhl;
        let udh_bytes = &payload[1..udh_octet_len.min(payload.len())];
        let udh = parse_udh(udh_bytes);
        let content = &payload[udh_octet_len.min(payload.len())..];
        (Some(udh), udh_octet_len, content)
    } else {
        (None, 0, payload)
    };

    let body = match tp_dcs {
        0x00 => {
            let skip_bits = if udh_octet_len > 0 {
                (7 - (udh_octet_len * 8) % 7) % 7
            } else {
                0
            };
            let udh_septets = if udh_octet_len > 0 {
                (udh_octet_len * 8 + skip_bits) / 7
            } else {
                0
            };
            let body_septets = tp_udl.saturating_sub(udh_septets);
            codec::unpack_gsm7(content, body_septets, skip_bits)
        }
        0x08 => codec::decode_ucs2(content),
        other => return Err(PduError::UnsupportedDcs(other)),
    };

    Ok(PduRecord {
        smsc,
        msg_type_flags,
        sender,
        tp_pid,
        tp_dcs,
        timestamp,
        udh,
        body,
    })
}
