use std::io;

use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};

use super::{clamp_range, Reader};

/// A remote object read with HTTP range requests.
///
/// `open` learns the size with a `HEAD`; every read is a `GET` with a
/// `Range` header. Servers that cap the bytes per response are followed up
/// with further requests until the range is filled.
#[derive(Debug, Clone)]
pub struct HttpReader {
    client: Client,
    url: String,
    size: u64,
}

impl HttpReader {
    pub async fn open(url: impl Into<String>) -> io::Result<Self> {
        Self::with_client(Client::new(), url).await
    }

    pub async fn with_client(client: Client, url: impl Into<String>) -> io::Result<Self> {
        let url = url.into();
        let response = client
            .head(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(io::Error::other)?;

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value: &HeaderValue| value.to_str().ok())
        };
        // A server that caps its responses answers with a partial body even
        // without a Range header; the full length is then in Content-Range.
        let total = match response.status() {
            StatusCode::PARTIAL_CONTENT => header(CONTENT_RANGE).and_then(content_range_total),
            _ => None,
        };
        let size = total
            .or_else(|| header(CONTENT_LENGTH).and_then(|value| value.parse::<u64>().ok()))
            .ok_or_else(|| io::Error::other(format!("no Content-Length for {url}")))?;

        debug!(%url, size, "opened remote source");
        Ok(HttpReader { client, url, size })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, start: u64, end_inclusive: u64) -> io::Result<Bytes> {
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={start}-{end_inclusive}"))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(io::Error::other)?;

        let status = response.status();
        let body = response.bytes().await.map_err(io::Error::other)?;

        if status == StatusCode::PARTIAL_CONTENT {
            return Ok(body);
        }

        // Range ignored, the whole object came back.
        let (from, len) = clamp_range(body.len() as u64, start, (end_inclusive - start + 1) as usize);
        let from = from as usize;
        Ok(body.slice(from..from + len))
    }
}

/// Complete length from a `bytes start-end/total` Content-Range value.
fn content_range_total(value: &str) -> Option<u64> {
    let (unit, rest) = value.trim().split_once(' ')?;
    if unit != "bytes" {
        return None;
    }
    rest.rsplit_once('/')?.1.parse().ok()
}

impl Reader for HttpReader {
    fn size(&self) -> u64 {
        self.size
    }

    #[tracing::instrument(skip(self), fields(url = %self.url), level = "trace")]
    async fn read(&self, offset: u64, length: usize) -> io::Result<Bytes> {
        let (start, length) = clamp_range(self.size, offset, length);
        let mut buf = BytesMut::with_capacity(length);

        while buf.len() < length {
            let from = start + buf.len() as u64;
            let to = start + length as u64 - 1;
            let chunk = self.fetch(from, to).await?;
            trace!(from, to, received = chunk.len(), "range response");
            if chunk.is_empty() {
                break;
            }
            let wanted = length - buf.len();
            buf.extend_from_slice(&chunk[..chunk.len().min(wanted)]);
        }

        Ok(buf.freeze())
    }
}
