//! Little-endian fixed-width integer helpers for on-disk records.
//!
//! The `get_*` readers take a slice and a byte position and return `None`
//! when the slice is too short, so decoders can turn truncation into a
//! corruption error instead of panicking.

use std::io::{self, Read, Write};

#[inline]
fn array<const N: usize>(buf: &[u8], pos: usize) -> Option<[u8; N]> {
    buf.get(pos..pos.checked_add(N)?)?.try_into().ok()
}

#[inline]
pub fn get_u16_le(buf: &[u8], pos: usize) -> Option<u16> {
    array(buf, pos).map(u16::from_le_bytes)
}

#[inline]
pub fn get_u32_le(buf: &[u8], pos: usize) -> Option<u32> {
    array(buf, pos).map(u32::from_le_bytes)
}

#[inline]
pub fn get_i32_le(buf: &[u8], pos: usize) -> Option<i32> {
    array(buf, pos).map(i32::from_le_bytes)
}

#[inline]
pub fn get_u64_le(buf: &[u8], pos: usize) -> Option<u64> {
    array(buf, pos).map(u64::from_le_bytes)
}

#[inline]
pub fn get_i64_le(buf: &[u8], pos: usize) -> Option<i64> {
    array(buf, pos).map(i64::from_le_bytes)
}

/// Pad `buf` with zero bytes up to the next multiple of `align`
pub fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.resize(buf.len() + (align - rem), 0);
    }
}

/// Round `len` up to a multiple of `align`
#[inline]
pub fn padded_len(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

/// Write a u64 in little-endian format
pub fn write_u64_le<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u64 in little-endian format
pub fn read_u64_le<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Big-endian encoding keeps byte order equal to numeric order
#[inline]
pub fn be_pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

#[inline]
pub fn split_be_pair_key(key: &[u8]) -> Option<(u64, u64)> {
    let a: [u8; 8] = key.get(..8)?.try_into().ok()?;
    let b: [u8; 8] = key.get(8..16)?.try_into().ok()?;
    Some((u64::from_be_bytes(a), u64::from_be_bytes(b)))
}
