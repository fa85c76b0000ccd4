use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};

/// Helper to write a string as length-prefixed UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

/// Helper to read a string from length-prefixed UTF-8 bytes.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

/// Helper to get encode size of a string.
pub fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

/// Writes a count-prefixed list of strings.
pub fn write_strings(strings: &[String], writer: &mut impl BufMut) {
    (strings.len() as u32).write(writer);
    for s in strings {
        write_string(s, writer);
    }
}

/// Reads a count-prefixed list of at most `max_items` strings of at most `max_len` bytes each.
pub fn read_strings(
    reader: &mut impl Buf,
    max_items: usize,
    max_len: usize,
) -> Result<Vec<String>, Error> {
    let count = u32::read(reader)? as usize;
    if count > max_items {
        return Err(Error::Invalid("Vec<String>", "too many items"));
    }
    let mut strings = Vec::with_capacity(count);
    for _ in 0..count {
        strings.push(read_string(reader, max_len)?);
    }
    Ok(strings)
}

pub fn strings_encode_size(strings: &[String]) -> usize {
    4 + strings.iter().map(|s| string_encode_size(s)).sum::<usize>()
}
