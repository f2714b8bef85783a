//! Byte-range planning
//!
//! Splits a resource of known size into contiguous, inclusive byte ranges
//! that cover `[0, content_size - 1]` with no gaps and no overlaps.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("segment count must be at least 1")]
    ZeroSegments,

    #[error("cannot split {content_size} bytes into {segment_count} segments")]
    TooManySegments {
        content_size: u64,
        segment_count: usize,
    },
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Inclusive byte range assigned to one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered (both bounds included)
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Compute the ordered ranges for `segment_count` segments.
///
/// Every segment but the last spans `content_size / segment_count + 1`
/// bytes and the last one absorbs whatever is left. When that would starve
/// later segments, the end is pulled back so each remaining segment keeps
/// at least one byte.
pub fn plan(content_size: u64, segment_count: usize) -> Result<Vec<ByteRange>> {
    if segment_count == 0 {
        return Err(PlanError::ZeroSegments);
    }

    let count = segment_count as u64;
    if content_size < count {
        return Err(PlanError::TooManySegments {
            content_size,
            segment_count,
        });
    }

    let base = content_size / count;
    let last = content_size - 1;
    let mut ranges = Vec::with_capacity(segment_count);

    for index in 0..segment_count {
        let start = match ranges.last() {
            Some(ByteRange { end, .. }) => end + 1,
            None => 0,
        };

        let end = if index == segment_count - 1 {
            last
        } else {
            let remaining_after = count - 1 - index as u64;
            (start + base).min(last - remaining_after)
        };

        ranges.push(ByteRange { index, start, end });
    }

    Ok(ranges)
}
