//! MMDB data section encoding and decoding
//!
//! Implements the MaxMind DB data type specification used for the records
//! stored behind the search tree.
//!
//! # Supported Types
//!
//! - **Pointer**: Reference to another data item (followed transparently by the decoder)
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16**: Unsigned 16-bit integers
//! - **Uint32**: Unsigned 32-bit integers
//! - **Map**: Key-value pairs (string keys)
//! - **Int32**: Signed 32-bit integers
//! - **Uint64**: Unsigned 64-bit integers
//! - **Uint128**: Unsigned 128-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Every value starts with a control byte: type in the top 3 bits, size in
//! the low 5 bits. Types above 7 use type 0 in the control byte followed by
//! an extra byte holding `type - 7`. Integers are stored big-endian using
//! the fewest bytes that hold the value.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use std::collections::HashMap;

use rustc_hash::FxHashMap;

use crate::mmdb::MmdbError;

/// Nested containers and pointer hops deeper than this
/// are treated as corruption.
const MAX_DECODE_DEPTH: usize = 512;

const TYPE_EXTENDED: u8 = 0;
const TYPE_POINTER: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOL: u8 = 14;
const TYPE_FLOAT: u8 = 15;

/// Decoded or to-be-encoded MMDB data value
///
/// Equality is structural: maps compare independent of key order, arrays
/// compare element-wise in order, and differing kinds never compare equal
/// (`Uint32(1) != Int32(1)`).
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Type name as used by the MaxMind DB format documentation
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "utf8_string",
            DataValue::Double(_) => "double",
            DataValue::Bytes(_) => "bytes",
            DataValue::Uint16(_) => "uint16",
            DataValue::Uint32(_) => "uint32",
            DataValue::Map(_) => "map",
            DataValue::Int32(_) => "int32",
            DataValue::Uint64(_) => "uint64",
            DataValue::Uint128(_) => "uint128",
            DataValue::Array(_) => "array",
            DataValue::Bool(_) => "boolean",
            DataValue::Float(_) => "float",
        }
    }

    /// Borrow the inner map, if this value is one
    pub fn as_map(&self) -> Option<&HashMap<String, DataValue>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the inner string, if this value is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used when reading metadata fields
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(u64::from(*n)),
            DataValue::Uint32(n) => Some(u64::from(*n)),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            DataValue::Int32(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

/// Data section encoder
///
/// Builds a data section by encoding values and tracking offsets.
/// Identical values get the same offset, and map keys that were already
/// written are replaced by pointers to the first copy.
pub struct DataEncoder {
    /// Encoded data buffer
    buffer: Vec<u8>,
    /// Canonical (pointer-free) encoding -> offset, for record deduplication
    dedup_map: FxHashMap<Vec<u8>, u32>,
    /// Offsets of map key strings already present in `buffer`
    key_offsets: FxHashMap<String, u32>,
}

impl DataEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            dedup_map: FxHashMap::default(),
            key_offsets: FxHashMap::default(),
        }
    }

    /// Encode a value and return its offset
    ///
    /// If the value was previously encoded, returns the existing offset.
    pub fn encode(&mut self, value: &DataValue) -> u32 {
        let mut canonical = Vec::new();
        write_value(value, &mut canonical, None);

        if let Some(&offset) = self.dedup_map.get(&canonical) {
            return offset;
        }

        let offset = self.buffer.len() as u32;
        let mut keys = KeyPool {
            known: &self.key_offsets,
            fresh: Vec::new(),
            base: offset,
        };
        let mut packed = Vec::with_capacity(canonical.len());
        write_value(value, &mut packed, Some(&mut keys));
        let fresh = keys.fresh;

        self.buffer.extend_from_slice(&packed);
        for (key, key_offset) in fresh {
            self.key_offsets.entry(key).or_insert(key_offset);
        }
        self.dedup_map.insert(canonical, offset);
        offset
    }

    /// Get the final encoded data section
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get current buffer size
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Encode a single value with no deduplication or key pointers
    ///
    /// Used for the metadata map, which must be self-contained.
    pub fn encode_standalone(value: &DataValue) -> Vec<u8> {
        let mut out = Vec::new();
        write_value(value, &mut out, None);
        out
    }
}

impl Default for DataEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Key strings visible to one `encode` call
struct KeyPool<'a> {
    known: &'a FxHashMap<String, u32>,
    fresh: Vec<(String, u32)>,
    base: u32,
}

impl KeyPool<'_> {
    fn lookup(&self, key: &str) -> Option<u32> {
        self.known.get(key).copied().or_else(|| {
            self.fresh
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, offset)| *offset)
        })
    }
}

fn write_value(value: &DataValue, out: &mut Vec<u8>, mut keys: Option<&mut KeyPool<'_>>) {
    match value {
        DataValue::String(s) => write_bytes_payload(TYPE_STRING, s.as_bytes(), out),
        DataValue::Double(d) => {
            write_control(TYPE_DOUBLE, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => write_bytes_payload(TYPE_BYTES, b, out),
        DataValue::Uint16(n) => write_uint(TYPE_UINT16, u128::from(*n), out),
        DataValue::Uint32(n) => write_uint(TYPE_UINT32, u128::from(*n), out),
        DataValue::Map(m) => {
            write_control(TYPE_MAP, m.len(), out);

            // Sorted by key for deterministic output
            let mut pairs: Vec<_> = m.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));

            for (key, value) in pairs {
                match keys.as_deref_mut() {
                    Some(pool) => match pool.lookup(key) {
                        Some(offset) => write_pointer(offset, out),
                        None => {
                            let at = pool.base + out.len() as u32;
                            write_bytes_payload(TYPE_STRING, key.as_bytes(), out);
                            pool.fresh.push((key.clone(), at));
                        }
                    },
                    None => write_bytes_payload(TYPE_STRING, key.as_bytes(), out),
                }
                write_value(value, out, keys.as_deref_mut());
            }
        }
        DataValue::Int32(n) => {
            // Negative values always need the full four bytes
            let bytes = n.to_be_bytes();
            let skip = if *n < 0 {
                0
            } else {
                bytes.iter().take_while(|b| **b == 0).count()
            };
            write_control(TYPE_INT32, 4 - skip, out);
            out.extend_from_slice(&bytes[skip..]);
        }
        DataValue::Uint64(n) => write_uint(TYPE_UINT64, u128::from(*n), out),
        DataValue::Uint128(n) => write_uint(TYPE_UINT128, *n, out),
        DataValue::Array(a) => {
            write_control(TYPE_ARRAY, a.len(), out);
            for item in a {
                write_value(item, out, keys.as_deref_mut());
            }
        }
        DataValue::Bool(b) => write_control(TYPE_BOOL, usize::from(*b), out),
        DataValue::Float(f) => {
            write_control(TYPE_FLOAT, 4, out);
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
}

fn write_bytes_payload(type_id: u8, payload: &[u8], out: &mut Vec<u8>) {
    write_control(type_id, payload.len(), out);
    out.extend_from_slice(payload);
}

/// Write an unsigned integer using the minimal number of big-endian bytes
fn write_uint(type_id: u8, n: u128, out: &mut Vec<u8>) {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    write_control(type_id, bytes.len() - skip, out);
    out.extend_from_slice(&bytes[skip..]);
}

/// Write a control byte (plus extended type byte and size bytes)
fn write_control(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let type_bits = if type_id > 7 { 0 } else { type_id << 5 };

    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 29 + 256 {
        (29, vec![(size - 29) as u8])
    } else if size < 29 + 256 + 65536 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65821) as u32).to_be_bytes()[1..].to_vec())
    };

    out.push(type_bits | size_bits);
    if type_id > 7 {
        out.push(type_id - 7);
    }
    out.extend_from_slice(&extra);
}

/// Write a pointer to `offset` within the data section
fn write_pointer(offset: u32, out: &mut Vec<u8>) {
    let control = TYPE_POINTER << 5;
    if offset < 2048 {
        out.push(control | ((offset >> 8) & 0x7) as u8);
        out.push(offset as u8);
    } else if offset < 526_336 {
        let v = offset - 2048;
        out.push(control | (1 << 3) | ((v >> 16) & 0x7) as u8);
        out.extend_from_slice(&v.to_be_bytes()[2..]);
    } else if offset < 134_744_064 {
        let v = offset - 526_336;
        out.push(control | (2 << 3) | ((v >> 24) & 0x7) as u8);
        out.extend_from_slice(&v.to_be_bytes()[1..]);
    } else {
        out.push(control | (3 << 3));
        out.extend_from_slice(&offset.to_be_bytes());
    }
}

/// Data section decoder
///
/// Decodes values from an encoded data section buffer, following pointers.
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section (offset 0 is its first byte)
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode a value at the given offset
    pub fn decode(&self, offset: u32) -> Result<DataValue, MmdbError> {
        let mut cursor = offset as usize;
        self.decode_at(&mut cursor, 0)
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<DataValue, MmdbError> {
        if depth > MAX_DECODE_DEPTH {
            return Err(decode_err("maximum nesting depth exceeded"));
        }

        let (type_id, size_bits) = self.read_control(cursor)?;

        if type_id == TYPE_POINTER {
            let target = self.read_pointer(cursor, size_bits)?;
            let mut target_cursor = target as usize;
            let (target_type, _) = self.peek_control(target_cursor)?;
            if target_type == TYPE_POINTER {
                return Err(decode_err("pointer to pointer"));
            }
            return self.decode_at(&mut target_cursor, depth + 1);
        }

        match type_id {
            TYPE_STRING => {
                let len = self.read_size(cursor, size_bits)?;
                let raw = self.take(cursor, len)?;
                let s = std::str::from_utf8(raw).map_err(|_| decode_err("invalid UTF-8"))?;
                Ok(DataValue::String(s.to_string()))
            }
            TYPE_DOUBLE => {
                let len = self.read_size(cursor, size_bits)?;
                if len != 8 {
                    return Err(decode_err("double must be 8 bytes"));
                }
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(self.take(cursor, 8)?);
                Ok(DataValue::Double(f64::from_be_bytes(bytes)))
            }
            TYPE_BYTES => {
                let len = self.read_size(cursor, size_bits)?;
                Ok(DataValue::Bytes(self.take(cursor, len)?.to_vec()))
            }
            TYPE_UINT16 => {
                let n = self.read_uint(cursor, size_bits, 2)?;
                Ok(DataValue::Uint16(n as u16))
            }
            TYPE_UINT32 => {
                let n = self.read_uint(cursor, size_bits, 4)?;
                Ok(DataValue::Uint32(n as u32))
            }
            TYPE_MAP => {
                let count = self.read_size(cursor, size_bits)?;
                let mut map = HashMap::with_capacity(count.min(1024));
                for _ in 0..count {
                    let key = match self.decode_at(cursor, depth + 1)? {
                        DataValue::String(s) => s,
                        _ => return Err(decode_err("map key must be a string")),
                    };
                    let value = self.decode_at(cursor, depth + 1)?;
                    map.insert(key, value);
                }
                Ok(DataValue::Map(map))
            }
            TYPE_INT32 => {
                let len = self.read_size(cursor, size_bits)?;
                if len > 4 {
                    return Err(decode_err("int32 larger than 4 bytes"));
                }
                let raw = self.take(cursor, len)?;
                let mut bytes = [0u8; 4];
                bytes[4 - len..].copy_from_slice(raw);
                Ok(DataValue::Int32(i32::from_be_bytes(bytes)))
            }
            TYPE_UINT64 => {
                let n = self.read_uint(cursor, size_bits, 8)?;
                Ok(DataValue::Uint64(n as u64))
            }
            TYPE_UINT128 => {
                let n = self.read_uint(cursor, size_bits, 16)?;
                Ok(DataValue::Uint128(n))
            }
            TYPE_ARRAY => {
                let count = self.read_size(cursor, size_bits)?;
                let mut array = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    array.push(self.decode_at(cursor, depth + 1)?);
                }
                Ok(DataValue::Array(array))
            }
            TYPE_BOOL => match size_bits {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err(decode_err("boolean size must be 0 or 1")),
            },
            TYPE_FLOAT => {
                let len = self.read_size(cursor, size_bits)?;
                if len != 4 {
                    return Err(decode_err("float must be 4 bytes"));
                }
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(self.take(cursor, 4)?);
                Ok(DataValue::Float(f32::from_be_bytes(bytes)))
            }
            other => Err(MmdbError::DecodeError(format!(
                "unknown data type {} at offset {}",
                other, *cursor
            ))),
        }
    }

    /// Read a control byte (and extended type byte) returning (type, size bits)
    fn read_control(&self, cursor: &mut usize) -> Result<(u8, u8), MmdbError> {
        let ctrl = self.byte(cursor)?;
        let mut type_id = ctrl >> 5;
        if type_id == TYPE_EXTENDED {
            type_id = self
                .byte(cursor)?
                .checked_add(7)
                .ok_or_else(|| decode_err("invalid extended type"))?;
            if type_id <= 7 {
                return Err(decode_err("invalid extended type"));
            }
        }
        Ok((type_id, ctrl & 0x1F))
    }

    fn peek_control(&self, offset: usize) -> Result<(u8, u8), MmdbError> {
        let mut cursor = offset;
        self.read_control(&mut cursor)
    }

    fn read_pointer(&self, cursor: &mut usize, size_bits: u8) -> Result<u32, MmdbError> {
        let ss = (size_bits >> 3) & 0x3;
        let vvv = u32::from(size_bits & 0x7);
        let pointer = match ss {
            0 => {
                let b = self.take(cursor, 1)?;
                (vvv << 8) | u32::from(b[0])
            }
            1 => {
                let b = self.take(cursor, 2)?;
                ((vvv << 16) | (u32::from(b[0]) << 8) | u32::from(b[1])) + 2048
            }
            2 => {
                let b = self.take(cursor, 3)?;
                ((vvv << 24) | (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
                    + 526_336
            }
            _ => {
                let b = self.take(cursor, 4)?;
                u32::from_be_bytes([b[0], b[1], b[2], b[3]])
            }
        };
        if pointer as usize >= self.buffer.len() {
            return Err(MmdbError::DecodeError(format!(
                "pointer {} outside data section of {} bytes",
                pointer,
                self.buffer.len()
            )));
        }
        Ok(pointer)
    }

    fn read_uint(&self, cursor: &mut usize, size_bits: u8, max: usize) -> Result<u128, MmdbError> {
        let len = self.read_size(cursor, size_bits)?;
        if len > max {
            return Err(MmdbError::DecodeError(format!(
                "unsigned integer of {} bytes exceeds {} bytes",
                len, max
            )));
        }
        Ok(self
            .take(cursor, len)?
            .iter()
            .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
    }

    fn read_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, MmdbError> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => Ok(29 + self.take(cursor, 1)?[0] as usize),
            30 => {
                let b = self.take(cursor, 2)?;
                Ok(285 + u16::from_be_bytes([b[0], b[1]]) as usize)
            }
            _ => {
                let b = self.take(cursor, 3)?;
                Ok(65_821 + (((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize))
            }
        }
    }

    fn byte(&self, cursor: &mut usize) -> Result<u8, MmdbError> {
        Ok(self.take(cursor, 1)?[0])
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], MmdbError> {
        let end = cursor
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                MmdbError::DecodeError(format!(
                    "{} bytes at offset {} run past the data section",
                    len, *cursor
                ))
            })?;
        let slice = &self.buffer[*cursor..end];
        *cursor = end;
        Ok(slice)
    }
}

fn decode_err(msg: &str) -> MmdbError {
    MmdbError::DecodeError(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &DataValue) -> DataValue {
        let mut encoder = DataEncoder::new();
        let offset = encoder.encode(value);
        let bytes = encoder.into_bytes();
        DataDecoder::new(&bytes).decode(offset).unwrap()
    }

    #[test]
    fn test_encode_decode_all_types() {
        let values = vec![
            DataValue::String("hello".to_string()),
            DataValue::Uint16(12345),
            DataValue::Uint32(0xDEADBEEF),
            DataValue::Uint64(0x123456789ABCDEF0),
            DataValue::Uint128(0x0123456789ABCDEF0123456789ABCDEF),
            DataValue::Int32(-42),
            DataValue::Int32(7),
            DataValue::Double(3.14159265359),
            DataValue::Float(2.71828),
            DataValue::Bool(true),
            DataValue::Bool(false),
            DataValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        ];

        let mut encoder = DataEncoder::new();
        let offsets: Vec<_> = values.iter().map(|v| encoder.encode(v)).collect();
        let bytes = encoder.into_bytes();
        let decoder = DataDecoder::new(&bytes);

        for (offset, expected) in offsets.iter().zip(values.iter()) {
            assert_eq!(&decoder.decode(*offset).unwrap(), expected);
        }
    }

    #[test]
    fn test_standard_byte_layout() {
        // Values taken from the MaxMind DB format documentation
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Uint32(0)),
            vec![0xC0]
        );
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Uint16(0x1234)),
            vec![0xA2, 0x12, 0x34]
        );
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Bool(true)),
            vec![0x01, 0x07]
        );
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Int32(-1)),
            vec![0x04, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Array(vec![])),
            vec![0x00, 0x04]
        );
        assert_eq!(
            DataEncoder::encode_standalone(&DataValue::Float(1.0)),
            vec![0x04, 0x08, 0x3F, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_decode_map() {
        let mut map = HashMap::new();
        map.insert("country".to_string(), DataValue::String("US".to_string()));
        map.insert("asn".to_string(), DataValue::Uint32(13335));
        map.insert("score".to_string(), DataValue::Double(0.95));

        let value = DataValue::Map(map);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_deduplication() {
        let mut encoder = DataEncoder::new();

        let value = DataValue::String("test".to_string());
        let offset1 = encoder.encode(&value);
        let offset2 = encoder.encode(&value);
        assert_eq!(offset1, offset2);

        let offset3 = encoder.encode(&DataValue::String("different".to_string()));
        assert_ne!(offset1, offset3);
    }

    #[test]
    fn test_repeated_keys_become_pointers() {
        let record = |score: u32| {
            let mut m = HashMap::new();
            m.insert("a_rather_long_key_name".to_string(), DataValue::Uint32(score));
            DataValue::Map(m)
        };

        let mut encoder = DataEncoder::new();
        let first = encoder.encode(&record(1));
        let after_first = encoder.size();
        let second = encoder.encode(&record(2));
        let second_len = encoder.size() - after_first;

        // control + pointer (2 bytes) + uint32 (2 bytes)
        assert_eq!(second_len, 1 + 2 + 2);

        let bytes = encoder.into_bytes();
        let decoder = DataDecoder::new(&bytes);
        assert_eq!(decoder.decode(first).unwrap(), record(1));
        assert_eq!(decoder.decode(second).unwrap(), record(2));
    }

    #[test]
    fn test_complex_nested_structure() {
        let mut threat_data = HashMap::new();
        threat_data.insert("threat_level".to_string(), DataValue::String("high".to_string()));
        threat_data.insert("confidence".to_string(), DataValue::Float(0.98));
        threat_data.insert("first_seen".to_string(), DataValue::Uint64(1704067200));

        let mut indicators = HashMap::new();
        indicators.insert("ip_count".to_string(), DataValue::Uint32(42));
        indicators.insert("threat_level".to_string(), DataValue::Int32(-3));
        threat_data.insert("indicators".to_string(), DataValue::Map(indicators));
        threat_data.insert(
            "tags".to_string(),
            DataValue::Array(vec![
                DataValue::String("botnet".to_string()),
                DataValue::String("c2".to_string()),
            ]),
        );

        let value = DataValue::Map(threat_data);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_large_strings() {
        for len in [28, 29, 100, 284, 285, 1000, 65_821, 70_000] {
            let value = DataValue::String("x".repeat(len));
            assert_eq!(roundtrip(&value), value, "length {}", len);
        }
    }

    #[test]
    fn test_pointer_sizes() {
        for offset in [0x100u32, 0x900, 0x10000, 0x90000] {
            let mut buf = Vec::new();
            write_pointer(offset, &mut buf);
            let mut data = buf.clone();
            data.resize(offset as usize + 1, 0);
            data[offset as usize] = 0xC0; // uint32 0
            let decoder = DataDecoder::new(&data);
            let mut cursor = 1;
            let size_bits = buf[0] & 0x1F;
            assert_eq!(decoder.read_pointer(&mut cursor, size_bits).unwrap(), offset);
        }
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let bytes = DataEncoder::encode_standalone(&DataValue::String("hello".to_string()));
        let decoder = DataDecoder::new(&bytes[..3]);
        assert!(decoder.decode(0).is_err());
    }

    #[test]
    fn test_pointer_to_pointer_rejected() {
        // offset 0: pointer -> 2, offset 2: pointer -> 0
        let bytes = vec![0x20, 0x02, 0x20, 0x00];
        let decoder = DataDecoder::new(&bytes);
        assert!(decoder.decode(0).is_err());
    }
}
