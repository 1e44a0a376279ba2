//! Semi-octet, GSM 03.38 7-bit, UCS-2 and TP-SCTS byte-level codecs.
//!
//! These are the leaf helpers every other PDU-decoding step builds on: phone
//! numbers, SMSC addresses and timestamps all arrive nibble-swapped
//! ("semi-octet") on the wire, and message bodies arrive either packed into
//! 7-bit septets (GSM 03.38 default alphabet) or as big-endian UCS-2.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("TP-SCTS too short: expected 7 bytes, got {0}")]
    TooShort(usize),
    #[error("TP-SCTS field out of range: {0}")]
    OutOfRange(&'static str),
}

/// GSM 03.38 default alphabet, indices 0..128. Index 0x1B (ESC) switches into
/// the extension table rather than producing a character on its own.
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// The extension table reached via an ESC (0x1B) septet. Unmapped extension
/// septets fall back to a space per common modem behavior.
fn gsm7_extension(septet: u8) -> char {
    match septet {
        0x0A => '\u{0C}', // form feed
        0x14 => '^',
        0x28 => '{',
        0x29 => '}',
        0x2F => '\\',
        0x3C => '[',
        0x3D => '~',
        0x3E => ']',
        0x40 => '|',
        0x65 => '€',
        _ => ' ',
    }
}

/// Nibble-swap decode: low nibble then high nibble of each byte, as a hex
/// digit string. Phone numbers, SMSC addresses and timestamps all arrive in
/// this packing on the wire.
pub fn semi_octet_to_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(hex_digit(b & 0x0F));
        out.push(hex_digit(b >> 4));
    }
    out
}

fn hex_digit(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'a' + (nibble - 10)) as char,
        _ => unreachable!("nibble out of range"),
    }
}

/// Decode a 7-byte TP-SCTS into `YYYY-MM-DD HH:MM:SS`. The 13th/14th
/// semi-octet digits (timezone, quarter-hours) are decoded as part of the
/// semi-octet string but otherwise discarded. Calendar-validated via
/// `chrono`, so e.g. `mm=02, dd=30` is rejected rather than accepted as a
/// plausible-looking but nonexistent date.
pub fn decode_timestamp(bytes: &[u8]) -> Result<String, TimestampError> {
    use chrono::{NaiveDate, NaiveTime};

    if bytes.len() < 7 {
        return Err(TimestampError::TooShort(bytes.len()));
    }
    let digits = semi_octet_to_string(&bytes[..7]);
    let field = |range: std::ops::Range<usize>, name: &'static str| -> Result<u32, TimestampError> {
        digits
            .get(range)
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or(TimestampError::OutOfRange(name))
    };

    let yy = field(0..2, "year")?;
    let mm = field(2..4, "month")?;
    let dd = field(4..6, "day")?;
    let hh = field(6..8, "hour")?;
    let mi = field(8..10, "minute")?;
    let ss = field(10..12, "second")?;

    let date = NaiveDate::from_ymd_opt(2000 + yy as i32, mm, dd).ok_or(TimestampError::OutOfRange("date"))?;
    let time = NaiveTime::from_hms_opt(hh, mi, ss).ok_or(TimestampError::OutOfRange("time"))?;

    Ok(format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M:%S")))
}

/// Unpack GSM 03.38 7-bit-packed octets into `septet_count` raw septets
/// (0..=127, pre-alphabet-lookup), discarding `skip_bits` leading bits so a
/// septet stream that starts right after a UDH aligns on a septet boundary.
pub fn unpack_septets(packed: &[u8], septet_count: usize, skip_bits: usize) -> Vec<u8> {
    let mut bits: u64 = 0;
    let mut nbits: u32 = 0;
    let mut skip = skip_bits as u32;
    let mut out = Vec::with_capacity(septet_count);

    for &b in packed {
        bits |= (b as u64) << nbits;
        nbits += 8;

        if skip > 0 {
            let take = skip.min(nbits);
            bits >>= take;
            nbits -= take;
            skip -= take;
        }

        while nbits >= 7 && out.len() < septet_count {
            out.push((bits & 0x7F) as u8);
            bits >>= 7;
            nbits -= 7;
        }
        if out.len() >= septet_count {
            break;
        }
    }
    if out.len() < septet_count && nbits > 0 {
        out.push((bits & 0x7F) as u8);
    }
    out.truncate(septet_count);
    out
}

/// Look up a raw septet stream in the GSM 03.38 default alphabet (with ESC
/// extension-table handling) and produce the decoded text.
pub fn septets_to_text(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter();
    while let Some(&s) = iter.next() {
        if s == 0x1B {
            if let Some(&ext) = iter.next() {
                out.push(gsm7_extension(ext));
            }
        } else {
            out.push(GSM7_BASIC[(s & 0x7F) as usize]);
        }
    }
    out
}

/// Convenience wrapper: unpack then alphabet-decode in one step, as used by
/// the PDU decoder for `dcs=0x00` bodies.
pub fn unpack_gsm7(packed: &[u8], septet_count: usize, skip_bits: usize) -> String {
    septets_to_text(&unpack_septets(packed, septet_count, skip_bits))
}

/// Big-endian UTF-16 (UCS-2) decode, as used for `dcs=0x08` bodies. Lone or
/// invalid surrogates are replaced with U+FFFD rather than aborting the
/// whole message.
pub fn decode_ucs2(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
