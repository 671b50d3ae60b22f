use std::io;

use bytes::Bytes;

use super::{clamp_range, Reader};

/// A fully resident buffer. Reads are zero-copy slices.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Bytes,
}

impl MemoryReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Vec<u8>> for MemoryReader {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for MemoryReader {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl Reader for MemoryReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self, offset: u64, length: usize) -> io::Result<Bytes> {
        let (start, length) = clamp_range(self.size(), offset, length);
        let start = start as usize;
        Ok(self.data.slice(start..start + length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_short_read_at_tail() {
        let reader = MemoryReader::new(b"Hello WebM".to_vec());
        assert_eq!(reader.size(), 10);
        assert_eq!(&reader.read(0, 5).await.unwrap()[..], b"Hello");
        assert_eq!(&reader.read(6, 12).await.unwrap()[..], b"WebM");
        assert!(reader.read(42, 12).await.unwrap().is_empty());
    }
}
