use std::io;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::trace;

use super::{clamp_range, Reader};

/// A local file. The size is taken once at open time; a file that keeps
/// growing afterwards is probed as it was when opened.
#[derive(Debug)]
pub struct FileReader {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
}

impl FileReader {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new().read(true).open(&path).await?;
        let size = file.metadata().await?.len();

        Ok(FileReader {
            file: Mutex::new(file),
            path,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reader for FileReader {
    fn size(&self) -> u64 {
        self.size
    }

    #[tracing::instrument(skip(self), fields(path = ?self.path), level = "trace")]
    async fn read(&self, offset: u64, length: usize) -> io::Result<Bytes> {
        let (start, length) = clamp_range(self.size, offset, length);
        let mut buf = BytesMut::zeroed(length);

        let mut file = self.file.lock().await;
        file.seek(io::SeekFrom::Start(start)).await?;

        let mut filled = 0;
        while filled < length {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                // Truncated underneath us since open.
                break;
            }
            filled += n;
        }
        trace!(filled, "read from file");

        buf.truncate(filled);
        Ok(buf.freeze())
    }
}
