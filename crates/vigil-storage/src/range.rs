//! Byte-range reads for seekable playback.
//!
//! Only single ranges of the form `bytes=START-` or `bytes=START-END` are
//! honoured. Anything else (suffix ranges, multiple ranges, garbage) is
//! treated as if no `Range` header had been sent and the whole file is served.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Read chunk size for streamed bodies (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^bytes=(\d+)-(\d*)$").unwrap());

/// Byte range within a file of `total` bytes, after clamping the end to
/// the last byte.
///
/// A range that starts at or past the end of the file is empty: it is still
/// answered as a partial response, with no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    len: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inclusive last byte, `-1` for a range on an empty file.
    pub fn end(&self) -> i128 {
        if self.len > 0 {
            i128::from(self.start) + i128::from(self.len) - 1
        } else {
            i128::from(self.total) - 1
        }
    }

    /// Value of the `Content-Range` header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end(), self.total)
    }
}

/// How a request should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    /// Serve the whole file (200).
    Full,
    /// Serve a sub-range (206).
    Partial(ByteRange),
}

/// Parse `bytes=START-END?`. `None` when the header does not have that shape
/// or `END < START`.
pub fn parse_range_header(value: &str) -> Option<(u64, Option<u64>)> {
    let caps = RANGE_RE.captures(value.trim())?;
    let start = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let end = match caps.get(2).map(|m| m.as_str()) {
        Some("") | None => None,
        Some(end) => Some(end.parse::<u64>().ok()?),
    };
    if end.is_some_and(|e| e < start) {
        return None;
    }
    Some((start, end))
}

/// Decide how to answer a request with an optional `Range` header on a file
/// of `size` bytes. The end is clamped to the last byte; whatever lies
/// between `start` and the clamped end is served.
pub fn resolve_range(header: Option<&str>, size: u64) -> RangeDecision {
    let Some((start, end)) = header.and_then(parse_range_header) else {
        return RangeDecision::Full;
    };
    let stop = end.map_or(size, |e| e.saturating_add(1).min(size));
    RangeDecision::Partial(ByteRange {
        start,
        len: stop.saturating_sub(start),
        total: size,
    })
}

/// Streamed body over part of a file.
pub type FileStream = ReaderStream<Take<File>>;

/// A file opened for a (possibly partial) response.
#[derive(Debug)]
pub struct RangedFile {
    /// Total file size.
    pub size: u64,
    /// `None` for a full-file response.
    pub range: Option<ByteRange>,
    /// Stream of at most [`CHUNK_SIZE`] byte chunks.
    pub stream: FileStream,
}

impl RangedFile {
    /// Bytes in the body.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.size, |r| r.len())
    }
}

/// Open `path` for a response honouring `range_header`.
///
/// A missing file is `NotFound` whatever the header says. The file is opened
/// and seeked per call and never read whole into memory.
pub async fn open_ranged(path: &Path, range_header: Option<&str>) -> StorageResult<RangedFile> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::not_found(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(StorageError::not_found(path.display().to_string()));
    }
    let size = metadata.len();

    let (range, offset, length) = match resolve_range(range_header, size) {
        RangeDecision::Full => (None, 0, size),
        RangeDecision::Partial(r) => (Some(r), r.start, r.len()),
    };

    if offset > 0 && length > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }
    debug!(path = %path.display(), size, offset, length, "Opened artifact");

    Ok(RangedFile {
        size,
        range,
        stream: ReaderStream::with_capacity(file.take(length), CHUNK_SIZE),
    })
}
