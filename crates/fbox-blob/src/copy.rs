//! Bounded copy shared by the backends' `put` implementations.

use std::io::{self, Read, Write};

use fbox_types::BlobHash;
use sha2::{Digest, Sha256};

use crate::error::{BlobError, BlobResult};

/// Writer adapter that feeds everything it forwards into a SHA-256 hasher.
struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy exactly `declared_size` bytes from `reader` into `writer`.
///
/// Bytes beyond the declared size are left unread. When `verify` is set the
/// copied bytes must hash to `hash` (compared case-insensitively).
pub(crate) fn copy_declared(
    hash: &BlobHash,
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    declared_size: u64,
    verify: bool,
) -> BlobResult<()> {
    let mut limited = reader.take(declared_size);
    let copied = if verify {
        let mut w = DigestWriter {
            inner: writer,
            hasher: Sha256::new(),
        };
        let copied = io::copy(&mut limited, &mut w)?;
        if copied == declared_size {
            let computed = hex::encode(w.hasher.finalize());
            if !computed.eq_ignore_ascii_case(hash.as_str()) {
                return Err(BlobError::DigestMismatch {
                    hash: hash.clone(),
                    computed,
                });
            }
        }
        copied
    } else {
        io::copy(&mut limited, writer)?
    };

    if copied < declared_size {
        return Err(BlobError::Truncated {
            hash: hash.clone(),
            expected: declared_size,
            actual: copied,
        });
    }
    Ok(())
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
