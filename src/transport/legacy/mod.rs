//! Legacy byte-oriented command-frame protocols: a family of buses whose
//! exact-length data phases, single-byte flow control, or packet-based
//! variants differ per bus, but which share a five-byte command frame and a
//! pluggable checksum algorithm (spec §4.3, §4.4).

pub mod byte_based;
pub mod packet_based;

use crate::codec::fold_checksum;

/// Flow-control bytes (spec §6).
pub const ACK: u8 = b'A';
/// NAK byte.
pub const NAK: u8 = b'N';
/// COMPLETE byte.
pub const COMPLETE: u8 = b'C';
/// ERROR byte.
pub const ERROR: u8 = b'E';

/// Five-byte legacy command frame, on-wire order `device, comnd, aux1,
/// aux2, checksum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdFrame {
    /// Destination device, bus-specific addressing.
    pub device: u8,
    /// Command byte.
    pub comnd: u8,
    /// First auxiliary byte.
    pub aux1: u8,
    /// Second auxiliary byte.
    pub aux2: u8,
    /// Frame checksum.
    pub checksum: u8,
}

impl CmdFrame {
    /// `aux1 | (aux2 << 8)`, per spec §6.
    pub fn aux12(&self) -> u16 {
        self.aux1 as u16 | ((self.aux2 as u16) << 8)
    }

    /// The four bytes the checksum is computed over.
    pub fn checksum_input(&self) -> [u8; 4] {
        [self.device, self.comnd, self.aux1, self.aux2]
    }
}

/// Which checksum algorithm a bus family uses over its command/data frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// The Atari family's 16-bit fold, same algorithm as the packet codec
    /// (spec §4.3: "the Atari family uses the same fold as §4.1").
    Fold,
    /// A plain XOR of all bytes, used by other legacy families.
    Xor,
}

impl ChecksumKind {
    /// Compute the checksum of `data` per this algorithm.
    pub fn compute(self, data: &[u8]) -> u8 {
        match self {
            ChecksumKind::Fold => fold_checksum(data),
            ChecksumKind::Xor => data.iter().fold(0u8, |acc, &b| acc ^ b),
        }
    }
}

/// The closed set of legacy response exchange shapes (spec §9 "Variant
/// codings"): ACK/NAK-then-data (byte-based buses), status-then-data
/// (packet-based buses), or immediate-data (no flow control at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStyle {
    /// COMPLETE/ERROR byte, then payload + checksum on success.
    AckNakThenData,
    /// A status packet, then an optional data packet.
    StatusThenData,
    /// Payload written directly, no flow-control byte at all.
    ImmediateData,
}

/// Per-bus policy: checksum algorithm, response shape, which commands carry
/// a host->peripheral data phase, and how long that data phase is.
#[derive(Clone, Copy)]
pub struct BusTraits {
    /// Checksum algorithm for command and data frames.
    pub checksum_kind: ChecksumKind,
    /// Response exchange shape.
    pub response_style: ResponseStyle,
    /// Whether `comnd` requires a host->peripheral data phase.
    pub needs_data: fn(u8) -> bool,
    /// Expected data-phase length (bytes, excluding the trailing checksum
    /// byte) for a given command. Default policy: always 256.
    pub data_len_for: fn(u8) -> usize,
}

fn default_needs_data(comnd: u8) -> bool {
    matches!(comnd, b'W' | b'P' | b'S')
}

fn atari_needs_data(comnd: u8) -> bool {
    matches!(comnd, b'W' | b'P' | b'S' | b'!')
}

fn default_data_len(_comnd: u8) -> usize {
    256
}

impl BusTraits {
    /// Generic fold-checksum family, narrow default data-needs policy
    /// (`W`, `P`, `S`).
    pub fn generic_fold() -> Self {
        Self {
            checksum_kind: ChecksumKind::Fold,
            response_style: ResponseStyle::AckNakThenData,
            needs_data: default_needs_data,
            data_len_for: default_data_len,
        }
    }

    /// The Atari SIO family: fold checksum, and `!` (format) also carries a
    /// data phase.
    pub fn atari_sio() -> Self {
        Self {
            checksum_kind: ChecksumKind::Fold,
            response_style: ResponseStyle::AckNakThenData,
            needs_data: atari_needs_data,
            data_len_for: default_data_len,
        }
    }

    /// A generic XOR-checksum legacy family.
    pub fn generic_xor() -> Self {
        Self {
            checksum_kind: ChecksumKind::Xor,
            response_style: ResponseStyle::AckNakThenData,
            needs_data: default_needs_data,
            data_len_for: default_data_len,
        }
    }

    /// Checksum `data` per this bus's algorithm.
    pub fn checksum(&self, data: &[u8]) -> u8 {
        self.checksum_kind.compute(data)
    }
}

/// Sleep for `micros` microseconds. Bus-specific inter-byte delays (commonly
/// ~250us before COMPLETE/ERROR) are expressed this way per spec §4.3/§5:
/// "Delays are expressed in microseconds and sleep-based; absolute precision
/// is the hardware layer's concern. The transport records but does not
/// enforce deadlines."
pub fn sleep_micros(micros: u64) {
    if micros > 0 {
        std::thread::sleep(std::time::Duration::from_micros(micros));
    }
}
