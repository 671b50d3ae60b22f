//! Minimal EBML encoding, enough to assemble synthetic files.

use bytes::{BufMut, BytesMut};

fn significant_bytes(value: u64) -> usize {
    (8 - value.leading_zeros() as usize / 8).max(1)
}

/// IDs are written as-is: the marker bit is already part of the value.
pub fn put_id(buf: &mut BytesMut, id: u64) {
    let len = significant_bytes(id);
    buf.put_slice(&id.to_be_bytes()[8 - len..]);
}

/// Shortest encoding of `size` that does not collide with the unknown-size marker.
pub fn put_size(buf: &mut BytesMut, size: u64) {
    let length = (1..=8usize)
        .find(|length| size < (1u64 << (7 * length)) - 1)
        .expect("element size exceeds 2^56 - 2");
    put_size_with_length(buf, size, length);
}

pub fn put_size_with_length(buf: &mut BytesMut, size: u64, length: usize) {
    let marked = size | (1u64 << (7 * length));
    buf.put_slice(&marked.to_be_bytes()[8 - length..]);
}

pub fn put_unknown_size(buf: &mut BytesMut) {
    buf.put_u8(0x01);
    buf.put_slice(&[0xFF; 7]);
}

pub fn put_bytes(buf: &mut BytesMut, id: u64, data: &[u8]) {
    put_id(buf, id);
    put_size(buf, data.len() as u64);
    buf.put_slice(data);
}

pub fn put_uint(buf: &mut BytesMut, id: u64, value: u64) {
    let len = significant_bytes(value);
    put_bytes(buf, id, &value.to_be_bytes()[8 - len..]);
}

/// Fixed width keeps the element length independent of the value, which lets
/// a SeekHead be sized before the positions it points at are known.
pub fn put_uint_fixed(buf: &mut BytesMut, id: u64, value: u64) {
    put_bytes(buf, id, &value.to_be_bytes());
}

pub fn put_float(buf: &mut BytesMut, id: u64, value: f64) {
    put_bytes(buf, id, &value.to_be_bytes());
}

pub fn put_string(buf: &mut BytesMut, id: u64, value: &str) {
    put_bytes(buf, id, value.as_bytes());
}

pub fn put_master(buf: &mut BytesMut, id: u64, content: &[u8]) {
    put_bytes(buf, id, content);
}

pub fn put_master_unknown(buf: &mut BytesMut, id: u64, content: &[u8]) {
    put_id(buf, id);
    put_unknown_size(buf);
    buf.put_slice(content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{ids, read_id, read_vint, ElementHeader, Size};

    #[test]
    fn test_writes_ids_verbatim() {
        for id in [ids::SIMPLE_BLOCK, ids::SEEK_ID, ids::TIMECODE_SCALE, ids::CLUSTER] {
            let mut buf = BytesMut::new();
            put_id(&mut buf, id);
            assert_eq!(read_id(&buf, 0).unwrap(), (id, buf.len()));
        }
    }

    #[test]
    fn test_size_avoids_all_ones() {
        let mut buf = BytesMut::new();
        put_size(&mut buf, 127);
        assert_eq!(&buf[..], &[0x40, 0x7F]);
        assert_eq!(read_vint(&buf, 0).unwrap().value, Size::Known(127));
    }

    #[test]
    fn test_unknown_size_master() {
        let mut buf = BytesMut::new();
        put_master_unknown(&mut buf, ids::CLUSTER, &[]);
        let header = ElementHeader::parse(&buf, 0).unwrap();
        assert_eq!(header.id, ids::CLUSTER);
        assert!(header.size.is_unknown());
        assert_eq!(header.header_len, 12);
    }

    #[test]
    fn test_uint_uses_fewest_bytes() {
        let mut buf = BytesMut::new();
        put_uint(&mut buf, ids::TIMECODE, 0);
        assert_eq!(&buf[..], &[0xE7, 0x81, 0x00]);
    }
}
