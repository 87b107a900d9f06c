//! Reading and writing of E2S records, the framing used by era files.
//!
//! An E2S file is a flat stream of records. Each record has an 8-byte header:
//! a little-endian `u16` type, a little-endian `u32` payload length and two
//! reserved bytes that must be zero, followed by `length` payload bytes.
//!
//! Block and state payloads are snappy framed; this crate provides the codec
//! helpers but does not interpret the SSZ inside (the era *downloader* is a
//! separate concern entirely).

use std::io::{Read, Write};
use types::Slot;

/// The 8 bytes of a version record, including its (empty) payload.
pub const VERSION_RECORD: [u8; 8] = [0x65, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

pub const HEADER_LEN: usize = 8;

/// Record types from the E2Store format description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordType(pub u16);

impl RecordType {
    pub const EMPTY: Self = Self(0x0000);
    pub const COMPRESSED_SIGNED_BEACON_BLOCK: Self = Self(0x0001);
    pub const COMPRESSED_BEACON_STATE: Self = Self(0x0002);
    pub const VERSION: Self = Self(0x3265);
    pub const SLOT_INDEX: Self = Self(0x3269);
}

#[derive(Debug, Clone, PartialEq)]
pub struct E2sRecord {
    pub kind: RecordType,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// A record header had nonzero reserved bytes.
    NonZeroReserved([u8; 2]),
    /// The stream ended inside a record payload.
    TruncatedPayload {
        expected: usize,
        read: usize,
    },
    /// The first record of a file must be a well-formed version record.
    InvalidVersion,
    /// A version record must have an empty payload.
    VersionPayloadNotEmpty,
    /// A slot index payload was malformed.
    InvalidSlotIndex,
    /// Snappy (de)compression failed.
    Snappy(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl E2sRecord {
    pub fn new(kind: RecordType, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    pub fn version() -> Self {
        Self::new(RecordType::VERSION, vec![])
    }

    /// Read a single record from `reader`.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (no header bytes at all).
    pub fn read<R: Read>(reader: &mut R) -> Result<Option<Self>, Error> {
        let mut header = [0u8; HEADER_LEN];
        match read_exact_or_none(reader, &mut header)? {
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::Filled => (),
        }

        let kind = RecordType(u16::from_le_bytes([header[0], header[1]]));
        let length = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
        let reserved = [header[6], header[7]];
        if reserved != [0, 0] {
            return Err(Error::NonZeroReserved(reserved));
        }

        let mut payload = vec![0u8; length];
        let mut read = 0;
        while read < length {
            let n = reader.read(&mut payload[read..])?;
            if n == 0 {
                return Err(Error::TruncatedPayload {
                    expected: length,
                    read,
                });
            }
            read += n;
        }

        Ok(Some(Self { kind, payload }))
    }

    /// Write this record, header first.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let mut header = [0u8; HEADER_LEN];
        header[0..2].copy_from_slice(&self.kind.0.to_le_bytes());
        header[2..6].copy_from_slice(&(self.payload.len() as u32).to_le_bytes());
        writer.write_all(&header)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    /// Check that this is a valid version record (first record of any file).
    pub fn verify_version(&self) -> Result<(), Error> {
        if self.kind != RecordType::VERSION {
            return Err(Error::InvalidVersion);
        }
        if !self.payload.is_empty() {
            return Err(Error::VersionPayloadNotEmpty);
        }
        Ok(())
    }
}

/// The slot index trailing an era group: the offset (relative to the index
/// record) of the record for each slot starting at `start_slot`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotIndex {
    pub start_slot: Slot,
    pub offsets: Vec<i64>,
}

impl SlotIndex {
    pub fn to_record(&self) -> E2sRecord {
        let mut payload = Vec::with_capacity(8 * (self.offsets.len() + 2));
        payload.extend_from_slice(&self.start_slot.as_u64().to_le_bytes());
        for offset in &self.offsets {
            payload.extend_from_slice(&offset.to_le_bytes());
        }
        payload.extend_from_slice(&(self.offsets.len() as u64).to_le_bytes());
        E2sRecord::new(RecordType::SLOT_INDEX, payload)
    }

    pub fn from_record(record: &E2sRecord) -> Result<Self, Error> {
        if record.kind != RecordType::SLOT_INDEX {
            return Err(Error::InvalidSlotIndex);
        }
        let payload = &record.payload;
        // Minimum: start_slot + count, zero offsets.
        if payload.len() < 16 || payload.len() % 8 != 0 {
            return Err(Error::InvalidSlotIndex);
        }

        let count_bytes: [u8; 8] = payload[payload.len() - 8..]
            .try_into()
            .map_err(|_| Error::InvalidSlotIndex)?;
        let count = u64::from_le_bytes(count_bytes) as usize;

        let expected_len = 8usize
            .checked_mul(count)
            .and_then(|n| n.checked_add(16))
            .ok_or(Error::InvalidSlotIndex)?;
        if payload.len() != expected_len {
            return Err(Error::InvalidSlotIndex);
        }

        let start_slot = Slot::new(u64::from_le_bytes(
            payload[0..8].try_into().map_err(|_| Error::InvalidSlotIndex)?,
        ));

        let offsets = payload[8..payload.len() - 8]
            .chunks_exact(8)
            .map(|chunk| i64::from_le_bytes(chunk.try_into().expect("chunk is 8 bytes")))
            .collect();

        Ok(Self {
            start_slot,
            offsets,
        })
    }
}

/// Snappy-frame compress `bytes` (the encoding used for block and state
/// payloads).
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = snap::write::FrameEncoder::new(Vec::new());
    encoder.write_all(bytes).map_err(Error::Snappy)?;
    encoder
        .into_inner()
        .map_err(|e| Error::Snappy(e.into_error()))
}

/// Snappy-frame decompress `bytes`.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = snap::read::FrameDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(Error::Snappy)?;
    Ok(out)
}

enum ReadOutcome {
    Filled,
    Eof,
}

/// Fill `buf` from `reader`, distinguishing "no bytes at all" from a short read.
fn read_exact_or_none<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<ReadOutcome, Error> {
    let mut read = 0;
    while read < buf.len() {
        let n = reader.read(&mut buf[read..])?;
        if n == 0 {
            if read == 0 {
                return Ok(ReadOutcome::Eof);
            }
            return Err(Error::TruncatedPayload {
                expected: buf.len(),
                read,
            });
        }
        read += n;
    }
    Ok(ReadOutcome::Filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn version_record_is_exactly_the_magic_bytes() {
        let mut out = Vec::new();
        E2sRecord::version().write(&mut out).unwrap();
        assert_eq!(out, VERSION_RECORD);
    }

    #[test]
    fn version_record_round_trips() {
        let mut cursor = Cursor::new(VERSION_RECORD.to_vec());
        let record = E2sRecord::read(&mut cursor).unwrap().unwrap();
        record.verify_version().unwrap();
    }

    #[test]
    fn record_round_trip() {
        let record = E2sRecord::new(
            RecordType::COMPRESSED_SIGNED_BEACON_BLOCK,
            vec![1, 2, 3, 4, 5],
        );
        let mut out = Vec::new();
        record.write(&mut out).unwrap();

        let mut cursor = Cursor::new(out);
        let read_back = E2sRecord::read(&mut cursor).unwrap().unwrap();
        assert_eq!(read_back, record);
        // Stream is exhausted afterwards.
        assert_eq!(E2sRecord::read(&mut cursor).unwrap(), None);
    }

    #[test]
    fn multiple_records_stream() {
        let mut out = Vec::new();
        E2sRecord::version().write(&mut out).unwrap();
        E2sRecord::new(RecordType::EMPTY, vec![]).write(&mut out).unwrap();
        E2sRecord::new(RecordType::COMPRESSED_BEACON_STATE, vec![9; 100])
            .write(&mut out)
            .unwrap();

        let mut cursor = Cursor::new(out);
        let first = E2sRecord::read(&mut cursor).unwrap().unwrap();
        first.verify_version().unwrap();
        let second = E2sRecord::read(&mut cursor).unwrap().unwrap();
        assert_eq!(second.kind, RecordType::EMPTY);
        let third = E2sRecord::read(&mut cursor).unwrap().unwrap();
        assert_eq!(third.payload.len(), 100);
        assert_eq!(E2sRecord::read(&mut cursor).unwrap(), None);
    }

    #[test]
    fn nonzero_reserved_bytes_rejected() {
        let mut bytes = VERSION_RECORD.to_vec();
        bytes[6] = 1;
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            E2sRecord::read(&mut cursor),
            Err(Error::NonZeroReserved([1, 0]))
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let record = E2sRecord::new(RecordType::EMPTY, vec![0; 32]);
        let mut out = Vec::new();
        record.write(&mut out).unwrap();
        out.truncate(out.len() - 1);

        let mut cursor = Cursor::new(out);
        assert!(matches!(
            E2sRecord::read(&mut cursor),
            Err(Error::TruncatedPayload { expected: 32, read: 31 })
        ));
    }

    #[test]
    fn slot_index_round_trip() {
        let index = SlotIndex {
            start_slot: Slot::new(8192),
            offsets: vec![-16, 0, 1024, 2048],
        };
        let record = index.to_record();
        assert_eq!(record.kind, RecordType::SLOT_INDEX);
        // start_slot + 4 offsets + count
        assert_eq!(record.payload.len(), 8 * 6);
        assert_eq!(SlotIndex::from_record(&record).unwrap(), index);
    }

    #[test]
    fn slot_index_count_mismatch_rejected() {
        let index = SlotIndex {
            start_slot: Slot::new(0),
            offsets: vec![1, 2, 3],
        };
        let mut record = index.to_record();
        // Corrupt the trailing count.
        let len = record.payload.len();
        record.payload[len - 8] = 99;
        assert!(matches!(
            SlotIndex::from_record(&record),
            Err(Error::InvalidSlotIndex)
        ));
    }

    #[test]
    fn snappy_round_trip() {
        let data: Vec<u8> = (0..255u8).cycle().take(10_000).collect();
        let compressed = compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }
}
