//! Element-at-a-time traversal on top of a [`Reader`].
//!
//! Headers are fetched with a single read of at most [`MAX_HEADER_LEN`]
//! bytes; element data is fetched only for the leaf values a scanner asks
//! for, bounded by that element's declared size.

use bytes::Bytes;
use tracing::trace;

use crate::ebml::{self, ids, ElementHeader, Size, MAX_HEADER_LEN};
use crate::error::{Result, WebmError};
use crate::reader::Reader;

/// Leaf values larger than this are not something a header field can be.
const MAX_VALUE_LEN: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    /// Absolute offset of the ID.
    pub offset: u64,
    pub header: ElementHeader,
}

impl Element {
    pub fn id(&self) -> u64 {
        self.header.id
    }

    pub fn size(&self) -> Size {
        self.header.size
    }

    pub fn data_start(&self) -> u64 {
        self.offset + self.header.header_len as u64
    }

    /// Offset right after the element, when its size is known.
    pub fn end(&self) -> Option<u64> {
        self.header
            .size
            .known()
            .map(|size| self.data_start().saturating_add(size))
    }
}

pub async fn read_element<R: Reader>(reader: &R, offset: u64) -> Result<Element> {
    let bytes = reader.read(offset, MAX_HEADER_LEN).await?;
    let header = ElementHeader::parse(&bytes, 0).map_err(|e| e.rebase(offset))?;
    Ok(Element { offset, header })
}

/// Walks the direct children in `[start, end)`.
///
/// Unknown children are simply yielded; callers skip them by not looking.
/// A child of unknown size ends the walk after it is yielded since there is
/// no way to find its end without parsing its contents.
pub struct ChildWalker<'r, R> {
    reader: &'r R,
    current: u64,
    end: u64,
}

impl<'r, R: Reader> ChildWalker<'r, R> {
    pub fn new(reader: &'r R, start: u64, end: u64) -> Self {
        Self {
            reader,
            current: start,
            end,
        }
    }

    /// Walks the contents of `parent`, up to the end of the source if its size is unknown.
    pub fn children_of(reader: &'r R, parent: &Element) -> Self {
        let end = parent.end().unwrap_or_else(|| reader.size());
        Self::new(reader, parent.data_start(), end)
    }

    pub async fn next(&mut self) -> Result<Option<Element>> {
        if self.current >= self.end {
            return Ok(None);
        }

        let element = read_element(self.reader, self.current).await?;
        trace!(
            offset = element.offset,
            id = %format!("0x{:X}", element.id()),
            name = ids::element_name(element.id()),
            size = ?element.size(),
            "element"
        );

        self.current = element.end().unwrap_or(self.end);
        Ok(Some(element))
    }
}

/// Reads the data of a leaf element.
pub async fn read_data<R: Reader>(reader: &R, element: &Element) -> Result<Bytes> {
    let size = element
        .size()
        .known()
        .ok_or_else(|| WebmError::invalid(element.offset, "value element of unknown size"))?;
    if size > MAX_VALUE_LEN {
        return Err(WebmError::invalid(element.offset, "value element too large"));
    }

    let data = reader.read(element.data_start(), size as usize).await?;
    if (data.len() as u64) < size {
        return Err(WebmError::invalid(
            element.data_start(),
            "element data past end of source",
        ));
    }
    Ok(data)
}

pub async fn read_uint<R: Reader>(reader: &R, element: &Element) -> Result<u64> {
    let data = read_data(reader, element).await?;
    ebml::read_uint(&data, 0, data.len()).map_err(|e| e.rebase(element.data_start()))
}

pub async fn read_float<R: Reader>(reader: &R, element: &Element) -> Result<f64> {
    let data = read_data(reader, element).await?;
    ebml::read_float(&data, 0, data.len()).map_err(|e| e.rebase(element.data_start()))
}

pub async fn read_string<R: Reader>(reader: &R, element: &Element) -> Result<String> {
    let data = read_data(reader, element).await?;
    ebml::read_string(&data, 0, data.len()).map_err(|e| e.rebase(element.data_start()))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::ebml::writer;
    use crate::reader::MemoryReader;

    #[tokio::test]
    async fn test_walks_and_skips_children() {
        let mut info = BytesMut::new();
        writer::put_uint(&mut info, ids::TIMECODE_SCALE, 1_000_000);
        writer::put_bytes(&mut info, 0x7BA9, b"ignored title");
        writer::put_string(&mut info, ids::MUXING_APP, "probe");

        let mut buf = BytesMut::new();
        writer::put_master(&mut buf, ids::INFO, &info);
        let reader = MemoryReader::new(buf.freeze());

        let info = read_element(&reader, 0).await.unwrap();
        assert_eq!(info.id(), ids::INFO);
        assert_eq!(info.end(), Some(reader.size()));

        let mut walker = ChildWalker::children_of(&reader, &info);
        let mut seen = vec![];
        while let Some(child) = walker.next().await.unwrap() {
            seen.push(child.id());
            if child.id() == ids::MUXING_APP {
                assert_eq!(read_string(&reader, &child).await.unwrap(), "probe");
            }
            if child.id() == ids::TIMECODE_SCALE {
                assert_eq!(read_uint(&reader, &child).await.unwrap(), 1_000_000);
            }
        }
        assert_eq!(seen, vec![ids::TIMECODE_SCALE, 0x7BA9, ids::MUXING_APP]);
    }

    #[tokio::test]
    async fn test_unknown_size_child_ends_walk() {
        let mut buf = BytesMut::new();
        writer::put_master_unknown(&mut buf, ids::CLUSTER, &[]);
        writer::put_uint(&mut buf, ids::TIMECODE, 7);
        let reader = MemoryReader::new(buf.freeze());

        let mut walker = ChildWalker::new(&reader, 0, reader.size());
        let first = walker.next().await.unwrap().unwrap();
        assert_eq!(first.id(), ids::CLUSTER);
        assert!(walker.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_value_is_invalid() {
        let mut buf = BytesMut::new();
        writer::put_string(&mut buf, ids::CODEC_ID, "V_VP9");
        let mut raw = buf.to_vec();
        raw.truncate(raw.len() - 2);
        let reader = MemoryReader::new(raw);

        let element = read_element(&reader, 0).await.unwrap();
        let err = read_string(&reader, &element).await.unwrap_err();
        assert!(matches!(err, WebmError::InvalidEncoding { offset: 2, .. }));
    }

    #[tokio::test]
    async fn test_header_offset_is_absolute() {
        let reader = MemoryReader::new(vec![0xEC, 0x80, 0x00, 0x00]);
        let err = read_element(&reader, 2).await.unwrap_err();
        assert!(matches!(err, WebmError::InvalidEncoding { offset: 2, .. }));
    }
}
