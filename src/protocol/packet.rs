use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};

/// MySQL packet header (zero-copy)
///
/// Layout matches the wire protocol: 3-byte little-endian length followed
/// by a 1-byte sequence id.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < 4 {
            return Err(Error::UnexpectedEof);
        }
        Self::ref_from_bytes(&data[..4]).map_err(|_| Error::InvalidPacket)
    }
}

/// Write a 4-byte packet header (length + sequence id) into `out`.
#[inline]
pub fn write_packet_header(out: &mut Vec<u8>, sequence_id: u8, payload_length: usize) {
    let bytes = (payload_length as u32).to_le_bytes();
    out.extend_from_slice(&bytes[..3]);
    out.push(sequence_id);
}

/// Same as [`write_packet_header`] but returns a stack array, for call sites
/// that want to issue a single vectored write instead of growing a `Vec`.
#[inline]
pub fn write_packet_header_array(sequence_id: u8, payload_length: usize) -> [u8; 4] {
    let bytes = (payload_length as u32).to_le_bytes();
    [bytes[0], bytes[1], bytes[2], sequence_id]
}
