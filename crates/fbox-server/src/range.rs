//! Single byte-range requests (`Range: bytes=...`).

use std::ops::Range;

/// One parsed `bytes=` range spec, not yet checked against a size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=a-b`, both ends inclusive.
    Bounded { first: u64, last: u64 },
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`, the final `n` bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Returns `None` for anything other than one well-formed byte range, in
    /// which case the header is ignored and the full content is served.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?.trim();
        if spec.contains(',') {
            return None;
        }
        let (first, last) = spec.split_once('-')?;
        let (first, last) = (first.trim(), last.trim());
        let number = |s: &str| -> Option<u64> {
            if s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        };

        match (first.is_empty(), last.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self::Suffix(number(last)?)),
            (false, true) => Some(Self::From(number(first)?)),
            (false, false) => {
                let (first, last) = (number(first)?, number(last)?);
                (first <= last).then_some(Self::Bounded { first, last })
            }
        }
    }

    /// Resolve against a blob of `size` bytes into a half-open byte range.
    ///
    /// Returns `None` when the range is unsatisfiable (answered with 416).
    pub fn resolve(self, size: u64) -> Option<Range<u64>> {
        match self {
            Self::Bounded { first, last } if first < size => Some(first..last.min(size - 1) + 1),
            Self::From(first) if first < size => Some(first..size),
            Self::Suffix(len) if len > 0 && size > 0 => Some(size.saturating_sub(len)..size),
            _ => None,
        }
    }
}

/// `Content-Range` value for a served half-open range.
pub fn content_range(range: &Range<u64>, size: u64) -> String {
    format!("bytes {}-{}/{}", range.start, range.end - 1, size)
}

/// `Content-Range` value accompanying a 416 response.
pub fn unsatisfied_range(size: u64) -> String {
    format!("bytes */{size}")
}
