//! # axum-range
//!
//! HTTP range responses for [`axum`][1] over any [`Reader`].
//!
//! ```ignore
//! use axum_extra::headers::Range;
//! use axum_extra::TypedHeader;
//!
//! use webm_probe::axum_range::Ranged;
//! use webm_probe::reader::FileReader;
//!
//! async fn file(range: Option<TypedHeader<Range>>) -> Response {
//!     let reader = FileReader::open("recording.webm").await?;
//!     let range = range.map(|TypedHeader(range)| range);
//!     Ranged::new(range, reader).respond().await.into_response()
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

use std::io;
use std::ops::Bound;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, Range};
use axum_extra::TypedHeader;
use bytes::Bytes;
use tracing::debug;

use crate::reader::Reader;

/// The main responder type.
pub struct Ranged<R: Reader> {
    range: Option<Range>,
    body: R,
    max_size_per_request: Option<u64>,
}

impl<R: Reader> Ranged<R> {
    /// Construct a ranged response over any [`Reader`] and an optional
    /// [`Range`] header.
    pub fn new(range: Option<Range>, body: R) -> Self {
        Ranged {
            range,
            body,
            max_size_per_request: None,
        }
    }

    /// Caps the number of bytes sent in one response. Clients are expected
    /// to follow up with another range request for the rest.
    pub fn with_max_size_per_request(mut self, max: Option<u64>) -> Self {
        self.max_size_per_request = max;
        self
    }

    /// Works out which bytes to send without reading any of them.
    ///
    /// Returns [`RangeNotSatisfiable`] if the requested range in the header
    /// was not satisfiable. Only the first range of the header is honoured.
    pub fn plan(&self) -> Result<RangePlan, RangeNotSatisfiable> {
        let total_bytes = self.body.size();
        let max_size_per_request = self.max_size_per_request.unwrap_or(u64::MAX);

        let (seek_start, seek_end_excl, partial) = match &self.range {
            Some(range_header) => {
                let satisfiable_range = range_header.satisfiable_ranges(total_bytes).next();
                let (seek_start, seek_end_excl) = match satisfiable_range {
                    Some((Bound::Included(seek_start), Bound::Included(end))) => {
                        (seek_start, end.saturating_add(1))
                    }
                    Some((Bound::Included(seek_start), Bound::Unbounded)) => {
                        (seek_start, total_bytes)
                    }
                    _ => (0, total_bytes),
                };

                if seek_start >= seek_end_excl || seek_end_excl > total_bytes {
                    return Err(RangeNotSatisfiable(ContentRange::unsatisfied_bytes(
                        total_bytes,
                    )));
                }
                (seek_start, seek_end_excl, true)
            }
            None => (0, total_bytes, false),
        };

        let length = (seek_end_excl - seek_start).min(max_size_per_request);
        let end = seek_start + length;
        // A capped full-body response has to say which part it carries.
        let content_range = if partial || end < total_bytes {
            ContentRange::bytes(seek_start..end, total_bytes).ok()
        } else {
            None
        };

        Ok(RangePlan {
            start: seek_start,
            length,
            content_range,
        })
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`].
    pub async fn respond(self) -> io::Result<Result<RangedResponse, RangeNotSatisfiable>> {
        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(unsatisfiable) => return Ok(Err(unsatisfiable)),
        };
        debug!(
            start = plan.start,
            length = plan.length,
            content_range = ?plan.content_range,
            "responding with range"
        );

        let body = self.body.read(plan.start, plan.length as usize).await?;
        if (body.len() as u64) < plan.length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "source shrank while serving range",
            ));
        }

        Ok(Ok(RangedResponse {
            content_range: plan.content_range,
            content_length: ContentLength(plan.length),
            body,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangePlan {
    pub start: u64,
    pub length: u64,
    /// `None` for a plain 200 of the whole body.
    pub content_range: Option<ContentRange>,
}

/// Error type indicating that the requested range was not satisfiable. Implements [`IntoResponse`].
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        let accept_ranges = TypedHeader(AcceptRanges::bytes());
        (status, header, accept_ranges, ()).into_response()
    }
}

/// Data type containing computed headers and body for a range response. Implements [`IntoResponse`].
pub struct RangedResponse {
    pub content_range: Option<ContentRange>,
    pub content_length: ContentLength,
    pub body: Bytes,
}

impl IntoResponse for RangedResponse {
    fn into_response(self) -> Response {
        let status = match self.content_range {
            Some(_) => StatusCode::PARTIAL_CONTENT,
            None => StatusCode::OK,
        };
        let content_range = self.content_range.map(TypedHeader);
        let content_length = TypedHeader(self.content_length);
        let accept_ranges = TypedHeader(AcceptRanges::bytes());

        (status, content_range, content_length, accept_ranges, self.body).into_response()
    }
}
