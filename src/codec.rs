//! FujiBus on-the-wire packet: SLIP framing around a length-prefixed,
//! descriptor-encoded packet format.
//!
//! Grounded in the original prototype's `fuji_bus_packet.{h,cpp}`: a 6-byte
//! header (`device, command, length:u16le, checksum, descr`), a chain of
//! descriptor bytes describing how many fixed-width parameters follow, and a
//! trailing payload.

use log::trace;

/// SLIP frame delimiter.
pub const SLIP_END: u8 = 0xC0;
/// SLIP escape byte.
pub const SLIP_ESC: u8 = 0xDB;
/// Escaped `END`.
pub const SLIP_ESC_END: u8 = 0xDC;
/// Escaped `ESC`.
pub const SLIP_ESC_ESC: u8 = 0xDD;

const HEADER_LEN: usize = 6;
const CHECKSUM_OFFSET: usize = 4;
const DESCR_OFFSET: usize = 5;

const DESCR_COUNT_MASK: u8 = 0x07;
const DESCR_EXCEEDS_U8: u8 = 0x04;
const DESCR_EXCEEDS_U16: u8 = 0x02;
const DESCR_ADDTL: u8 = 0x80;
const MAX_BYTES_PER_DESCR: usize = 4;

const FIELD_SIZE_TABLE: [u8; 8] = [0, 1, 1, 1, 1, 2, 2, 4];
const FIELD_COUNT_TABLE: [u8; 8] = [0, 1, 2, 3, 4, 1, 2, 1];

/// A single parameter value with an explicit declared width (1, 2, or 4
/// bytes), used when *building* a packet so the serializer groups
/// same-width runs into descriptors correctly (spec §3: "field_size"/
/// "field_count" tables are indexed by width, and a caller that declares a
/// 16-bit field must not have it silently collapsed to 8 bits just because
/// the value happens to fit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    /// The value, right-justified in a u32.
    pub value: u32,
    /// Declared width in bytes: 1, 2, or 4.
    pub width: u8,
}

impl Param {
    /// An 8-bit parameter.
    pub fn u8(v: u8) -> Self {
        Self {
            value: v as u32,
            width: 1,
        }
    }
    /// A 16-bit parameter.
    pub fn u16(v: u16) -> Self {
        Self {
            value: v as u32,
            width: 2,
        }
    }
    /// A 32-bit parameter.
    pub fn u32(v: u32) -> Self {
        Self { value: v, width: 4 }
    }
}

/// A decoded or about-to-be-serialized FujiBus packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Destination device.
    pub device: u8,
    /// Command byte.
    pub command: u8,
    /// Width-tagged parameters, in wire order.
    pub params: Vec<Param>,
    /// Raw payload bytes following the parameters.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a packet with no params and no payload.
    pub fn new(device: u8, command: u8) -> Self {
        Self {
            device,
            command,
            params: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Parameter values collapsed to `u32`, discarding declared width.
    /// This is what the `Request`/`Response` layer above the codec sees.
    pub fn param_values(&self) -> Vec<u32> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// Serialize into a SLIP-encoded wire frame.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LEN];

        let mut descr_bytes: Vec<u8> = Vec::new();
        let mut idx = 0;
        while idx < self.params.len() {
            let mut field_width = 0u8;
            let mut bytes_written = 0usize;
            let mut count = 0usize;
            while idx + count < self.params.len() {
                let p = &self.params[idx + count];
                if (field_width != 0 && field_width != p.width)
                    || bytes_written == MAX_BYTES_PER_DESCR
                {
                    break;
                }
                field_width = p.width;
                out.extend_from_slice(&p.value.to_le_bytes()[..p.width as usize]);
                bytes_written += p.width as usize;
                count += 1;
            }
            let mut descr = count as u8;
            if field_width > 1 {
                descr |= DESCR_EXCEEDS_U8;
                if field_width > 2 {
                    descr |= DESCR_EXCEEDS_U16;
                }
            }
            descr_bytes.push(descr | DESCR_ADDTL);
            idx += count;
        }

        let first_descr = if let Some(last) = descr_bytes.last_mut() {
            *last &= !DESCR_ADDTL;
            let first = descr_bytes[0];
            if descr_bytes.len() > 1 {
                out.splice(HEADER_LEN..HEADER_LEN, descr_bytes[1..].iter().copied());
            }
            first
        } else {
            0
        };

        out.extend_from_slice(&self.payload);

        let total_len = out.len() as u16;
        out[0] = self.device;
        out[1] = self.command;
        out[2..4].copy_from_slice(&total_len.to_le_bytes());
        out[CHECKSUM_OFFSET] = 0;
        out[DESCR_OFFSET] = first_descr;

        let checksum = fold_checksum(&out);
        out[CHECKSUM_OFFSET] = checksum;

        slip_encode(&out)
    }

    /// Parse a single SLIP-encoded frame (the bytes between and including a
    /// matching pair of `END` markers). Returns `None` on any malformed
    /// input; per spec §4.1 all parse errors are non-fatal and local.
    pub fn parse(input: &[u8]) -> Option<Self> {
        let start = input.iter().position(|&b| b == SLIP_END)?;
        let frame = &input[start..];
        if frame.len() < HEADER_LEN + 2 {
            return None;
        }
        if *frame.first()? != SLIP_END || *frame.last()? != SLIP_END {
            return None;
        }

        let decoded = slip_decode(frame);
        if decoded.len() < HEADER_LEN {
            return None;
        }

        let device = decoded[0];
        let command = decoded[1];
        let length = u16::from_le_bytes([decoded[2], decoded[3]]) as usize;
        let checksum = decoded[CHECKSUM_OFFSET];

        if length != decoded.len() {
            trace!("packet length mismatch: header={length} actual={}", decoded.len());
            return None;
        }

        let mut zeroed = decoded.clone();
        zeroed[CHECKSUM_OFFSET] = 0;
        if fold_checksum(&zeroed) != checksum {
            trace!("packet checksum mismatch");
            return None;
        }

        let mut offset = HEADER_LEN;
        let mut descr_chain = vec![decoded[DESCR_OFFSET]];
        while descr_chain.last().copied().unwrap_or(0) & DESCR_ADDTL != 0 {
            if offset >= decoded.len() {
                return None;
            }
            descr_chain.push(decoded[offset]);
            offset += 1;
        }

        let mut params = Vec::new();
        for &dbyte in &descr_chain {
            let field = (dbyte & DESCR_COUNT_MASK) as usize;
            let count = FIELD_COUNT_TABLE[field];
            if count == 0 {
                continue;
            }
            let width = FIELD_SIZE_TABLE[field];
            for _ in 0..count {
                if offset + width as usize > decoded.len() {
                    return None;
                }
                let mut bytes = [0u8; 4];
                bytes[..width as usize].copy_from_slice(&decoded[offset..offset + width as usize]);
                params.push(Param {
                    value: u32::from_le_bytes(bytes),
                    width,
                });
                offset += width as usize;
            }
        }

        let payload = decoded[offset..].to_vec();

        Some(Packet {
            device,
            command,
            params,
            payload,
        })
    }
}

/// 16-bit-fold-to-8-bit checksum, per spec §4.1: `c += b; c = (c>>8) +
/// (c&0xFF)` for every byte, final result is the low 8 bits.
pub fn fold_checksum(data: &[u8]) -> u8 {
    let mut c: u16 = 0;
    for &b in data {
        c += b as u16;
        c = (c >> 8) + (c & 0xFF);
    }
    c as u8
}

/// SLIP-encode a raw buffer: `END ... END`, escaping any `END`/`ESC` bytes
/// inside.
pub fn slip_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2 + 2);
    out.push(SLIP_END);
    for &b in input {
        match b {
            SLIP_END => {
                out.push(SLIP_ESC);
                out.push(SLIP_ESC_END);
            }
            SLIP_ESC => {
                out.push(SLIP_ESC);
                out.push(SLIP_ESC_ESC);
            }
            b => out.push(b),
        }
    }
    out.push(SLIP_END);
    out
}

/// SLIP-decode a frame, starting *after* its first `END` byte, stopping at
/// the next unescaped `END`. A malformed escape (escape followed by
/// anything other than `ESC_END`/`ESC_ESC`) is silently dropped; a
/// truncated escape ends decoding early.
pub fn slip_decode(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len());
    let mut iter = frame.iter().copied();
    // Skip up to and including the first END.
    for b in iter.by_ref() {
        if b == SLIP_END {
            break;
        }
    }
    while let Some(b) = iter.next() {
        if b == SLIP_END {
            break;
        }
        if b == SLIP_ESC {
            match iter.next() {
                Some(SLIP_ESC_END) => out.push(SLIP_END),
                Some(SLIP_ESC_ESC) => out.push(SLIP_ESC),
                Some(_) => { /* malformed escape: silently dropped */ }
                None => break, // truncated escape
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Extract the next complete SLIP frame (`END ... END` inclusive) from the
/// front of `buf`, discarding any line noise before the first `END`. Shared
/// by every transport that frames on SLIP, packet-framed or legacy
/// packet-based alike.
pub fn take_slip_frame(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    loop {
        let first = buf.iter().position(|&b| b == SLIP_END)?;
        if first > 0 {
            trace!("discarding {first} bytes of line noise before first END");
            buf.drain(..first);
        }
        let second = buf[1..].iter().position(|&b| b == SLIP_END).map(|i| i + 1)?;
        return Some(buf.drain(..=second).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slip_transparency_for_special_bytes() {
        let data = vec![0x00, SLIP_END, 0x01, SLIP_ESC, 0xFF];
        let encoded = slip_encode(&data);
        assert_eq!(encoded.first(), Some(&SLIP_END));
        assert_eq!(encoded.last(), Some(&SLIP_END));
        let decoded = slip_decode(&encoded);
        assert_eq!(decoded, data);
    }

    #[test]
    fn slip_decode_truncated_escape_stops_early() {
        let mut frame = vec![SLIP_END, 0x01, SLIP_ESC];
        let decoded = slip_decode(&frame);
        assert_eq!(decoded, vec![0x01]);
        frame.push(SLIP_END);
        // A trailing END right after the dangling escape is consumed as
        // part of "truncated escape ends decoding", not as a frame END.
        let decoded2 = slip_decode(&frame);
        assert_eq!(decoded2, vec![0x01]);
    }

    #[test]
    fn checksum_is_fold_of_bytes() {
        assert_eq!(fold_checksum(&[]), 0);
        assert_eq!(fold_checksum(&[1, 2, 3]), 6);
        assert_eq!(fold_checksum(&[0xFF, 0xFF]), 0xFE + 1);
    }

    #[test]
    fn round_trip_with_mixed_widths() {
        let pkt = Packet {
            device: 0xFE,
            command: 0x02,
            params: vec![Param::u16(0), Param::u16(64)],
            payload: vec![0xAA, 0xBB],
        };
        let wire = pkt.serialize();
        let decoded = Packet::parse(&wire).expect("parses");
        assert_eq!(decoded.device, 0xFE);
        assert_eq!(decoded.command, 0x02);
        assert_eq!(decoded.param_values(), vec![0, 64]);
        assert_eq!(decoded.payload, vec![0xAA, 0xBB]);
    }

    #[test]
    fn round_trip_property_like_various_widths_and_counts() {
        let cases: Vec<Vec<Param>> = vec![
            vec![],
            vec![Param::u8(7)],
            vec![Param::u8(1), Param::u8(2), Param::u8(3), Param::u8(4), Param::u8(5)],
            vec![Param::u32(0xDEAD_BEEF)],
            vec![Param::u8(1), Param::u16(2), Param::u32(3)],
        ];
        for params in cases {
            let pkt = Packet {
                device: 1,
                command: 2,
                params: params.clone(),
                payload: vec![9, 9, 9],
            };
            let wire = pkt.serialize();
            let decoded = Packet::parse(&wire).expect("parses");
            assert_eq!(decoded.params, params);
            assert_eq!(decoded.payload, vec![9, 9, 9]);
        }
    }

    #[test]
    fn corrupting_a_byte_fails_parse() {
        let pkt = Packet {
            device: 3,
            command: 4,
            params: vec![Param::u32(123)],
            payload: vec![1, 2, 3],
        };
        let mut wire = pkt.serialize();
        // Flip a payload bit without touching SLIP framing bytes.
        let mid = wire.len() / 2;
        wire[mid] ^= 0x01;
        assert!(Packet::parse(&wire).is_none() || Packet::parse(&wire) != Some(pkt));
    }

    #[test]
    fn no_frame_yet_returns_none() {
        assert!(Packet::parse(&[1, 2, 3]).is_none());
    }

    #[test]
    fn truncated_frame_is_rejected() {
        assert!(Packet::parse(&[SLIP_END, 1, 2, SLIP_END]).is_none());
    }

    #[test]
    fn take_slip_frame_drops_leading_noise_and_stops_at_second_end() {
        let mut buf = vec![0xFF, 0xFE, SLIP_END, 1, 2, SLIP_END, 9, 9];
        let frame = take_slip_frame(&mut buf).expect("one frame");
        assert_eq!(frame, vec![SLIP_END, 1, 2, SLIP_END]);
        assert_eq!(buf, vec![9, 9]);
    }

    #[test]
    fn take_slip_frame_returns_none_on_incomplete_input() {
        let mut buf = vec![SLIP_END, 1, 2];
        assert!(take_slip_frame(&mut buf).is_none());
        assert_eq!(buf, vec![SLIP_END, 1, 2]);
    }

    #[test]
    fn leading_noise_before_first_end_is_discarded() {
        let pkt = Packet::new(5, 6);
        let mut wire = pkt.serialize();
        let mut with_noise = vec![0xFF, 0xFE, 0xFD];
        with_noise.append(&mut wire);
        let decoded = Packet::parse(&with_noise).expect("parses past noise");
        assert_eq!(decoded.device, 5);
        assert_eq!(decoded.command, 6);
    }
}
