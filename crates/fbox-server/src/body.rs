//! Bridges between blocking blob I/O and streamed HTTP bodies.

use std::io::{self, Read};

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::io::{StreamReader, SyncIoBridge};

const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks read ahead of the client.
const READ_AHEAD: usize = 4;

/// Stream `reader` as a response body.
///
/// Reads happen on the blocking pool, at most `READ_AHEAD` chunks ahead of
/// what the client has consumed. A dropped body stops the reader.
pub fn streamed(mut reader: impl Read + Send + 'static) -> Body {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(READ_AHEAD);
    tokio::task::spawn_blocking(move || loop {
        let mut buf = BytesMut::zeroed(CHUNK_SIZE);
        let chunk = match reader.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                buf.truncate(n);
                Ok(buf.freeze())
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "blob read failed mid-stream");
                Err(e)
            }
        };
        let failed = chunk.is_err();
        if tx.blocking_send(chunk).is_err() {
            tracing::debug!("client went away, stopping blob stream");
            return;
        }
        if failed {
            return;
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::from_stream(stream)
}

/// Blocking reader over a request body. Must be created inside the runtime
/// and read from the blocking pool.
pub fn blocking_reader(body: Body) -> impl Read + Send + 'static {
    let stream = body.into_data_stream().map_err(io::Error::other);
    SyncIoBridge::new(StreamReader::new(stream))
}
