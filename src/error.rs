//! Error types for WebM probing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebmError {
    /// Malformed VINT, element ID or float width.
    #[error("Invalid encoding at offset {offset}: {reason}")]
    InvalidEncoding { offset: u64, reason: &'static str },

    /// No Segment element within the header scan window.
    #[error("Segment element not found in the first {scanned} bytes")]
    SegmentNotFound { scanned: u64 },

    /// An element was expected at `offset` but something else (or nothing) was there.
    ///
    /// Only used as a fallback signal between scanners; `parse_webm` never returns it.
    #[error("Element 0x{id:X} not found at offset {offset}")]
    ElementNotFound { id: u64, offset: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebmError {
    pub(crate) fn invalid(offset: u64, reason: &'static str) -> Self {
        WebmError::InvalidEncoding { offset, reason }
    }

    /// Shifts a window-relative encoding offset to an absolute file offset.
    pub(crate) fn rebase(self, base: u64) -> Self {
        match self {
            WebmError::InvalidEncoding { offset, reason } => WebmError::InvalidEncoding {
                offset: base + offset,
                reason,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WebmError::ElementNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, WebmError>;
