use std::io::{self, Write};

/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Write a u32 varint straight to a writer, returns bytes written
pub fn write_varint<W: Write>(writer: &mut W, value: u32) -> io::Result<usize> {
    let mut buf = [0u8; 5];
    let mut len = 0;
    let mut value = value;
    loop {
        if value < 0x80 {
            buf[len] = value as u8;
            len += 1;
            break;
        }
        buf[len] = (value as u8) | 0x80;
        len += 1;
        value >>= 7;
    }
    writer.write_all(&buf[..len])?;
    Ok(len)
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Delta-encode a strictly ascending list of u32s
pub fn delta_encode(values: &[u32], buf: &mut Vec<u8>) {
    let mut prev = 0u32;
    for &value in values {
        encode_varint(value - prev, buf);
        prev = value;
    }
}

/// Delta-decode a run of varints into absolute values.
/// Returns None if the run ends in the middle of a varint.
pub fn delta_decode(buf: &[u8]) -> Option<Vec<u32>> {
    let mut result = Vec::with_capacity(buf.len());
    let mut prev = 0u32;
    let mut pos = 0;

    while pos < buf.len() {
        let (delta, consumed) = decode_varint(&buf[pos..])?;
        prev = prev.checked_add(delta)?;
        result.push(prev);
        pos += consumed;
    }

    Some(result)
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write an i32 in little-endian format
pub fn write_i32_le<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write an i64 in little-endian format
pub fn write_i64_le<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a little-endian u32 at `offset`, None if out of bounds
pub fn read_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a little-endian i32 at `offset`, None if out of bounds
pub fn read_i32_at(buf: &[u8], offset: usize) -> Option<i32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(i32::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a little-endian i64 at `offset`, None if out of bounds
pub fn read_i64_at(buf: &[u8], offset: usize) -> Option<i64> {
    let bytes = buf.get(offset..offset.checked_add(8)?)?;
    Some(i64::from_le_bytes(bytes.try_into().ok()?))
}
