use std::io::{Read, Seek, SeekFrom, Take};
use std::ops::Range;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, IF_NONE_MATCH, RANGE,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use fbox_blob::BlobRead;
use fbox_push::{FinalizeRequest, PushPlan};
use fbox_types::{BlobHash, BoxRecord, Commit, CommitId, Entry, NewBox, Visibility};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::body::{blocking_reader, streamed};
use crate::error::{ServerError, ServerResult};
use crate::range::{content_range, unsatisfied_range, ByteRange};
use crate::state::AppState;

type SharedState = Arc<AppState>;

/// Default and maximum number of commits returned by a history listing.
const DEFAULT_COMMIT_LIMIT: usize = 10;
const MAX_COMMIT_LIMIT: usize = 100;

/// Run a store call on the blocking pool.
async fn blocking<T, F>(state: &SharedState, f: F) -> ServerResult<T>
where
    F: FnOnce(&AppState) -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("invalid JSON: {e}")))
}

fn find_box(state: &AppState, name: &str) -> ServerResult<BoxRecord> {
    state
        .meta
        .get_box(&state.namespace, name)?
        .ok_or_else(|| ServerError::BoxNotFound(name.to_string()))
}

fn header_value(value: String) -> ServerResult<HeaderValue> {
    HeaderValue::try_from(value).map_err(|e| ServerError::Internal(e.to_string()))
}

/// GET /v0/health
pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct CreateBoxRequest {
    pub name: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// POST /v0/boxes
pub async fn create_box(
    State(state): State<SharedState>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<BoxRecord>)> {
    let req: CreateBoxRequest = parse_json(&body)?;
    let mut new_box = NewBox::named(req.name);
    if let Some(visibility) = req.visibility.filter(|v| !v.is_empty()) {
        new_box = new_box.with_visibility(visibility.parse::<Visibility>()?);
    }
    if let Some(branch) = req.default_branch {
        new_box = new_box.with_default_branch(branch);
    }

    let record = blocking(&state, move |s| {
        new_box.namespace_id = s.namespace.clone();
        Ok(s.meta.create_box(new_box)?)
    })
    .await?;
    tracing::info!(box_id = %record.id, name = %record.name, "box created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v0/boxes
pub async fn list_boxes(State(state): State<SharedState>) -> ServerResult<Json<Vec<BoxRecord>>> {
    let boxes = blocking(&state, |s| Ok(s.meta.list_public_boxes()?)).await?;
    Ok(Json(boxes))
}

/// GET /v0/boxes/:box
pub async fn get_box(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ServerResult<Json<BoxRecord>> {
    let record = blocking(&state, move |s| find_box(s, &name)).await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// POST /v0/boxes/:box/push/plan
pub async fn push_plan(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ServerResult<Json<PushPlan>> {
    let req: PlanRequest = parse_json(&body)?;
    let plan = blocking(&state, move |s| {
        let target = find_box(s, &name)?;
        Ok(s.push.plan(&target, &req.entries)?)
    })
    .await?;
    Ok(Json(plan))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub commit_id: CommitId,
}

/// POST /v0/boxes/:box/push/finalize
pub async fn push_finalize(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<FinalizeResponse>)> {
    let req: FinalizeRequest = parse_json(&body)?;
    let commit = blocking(&state, move |s| {
        let target = find_box(s, &name)?;
        Ok(s.push.finalize(&target, req)?)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(FinalizeResponse {
            commit_id: commit.id,
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitsQuery {
    pub branch: Option<String>,
    /// Kept as text so that an unparsable value falls back to the default.
    pub limit: Option<String>,
}

impl CommitsQuery {
    fn branch_or(&self, target: &BoxRecord) -> String {
        match &self.branch {
            Some(b) if !b.is_empty() => b.clone(),
            _ => target.default_branch.clone(),
        }
    }

    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|n| (1..=MAX_COMMIT_LIMIT).contains(n))
            .unwrap_or(DEFAULT_COMMIT_LIMIT)
    }
}

/// GET /v0/boxes/:box/commits
pub async fn list_commits(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(query): Query<CommitsQuery>,
) -> ServerResult<Json<Vec<Commit>>> {
    let commits = blocking(&state, move |s| {
        let target = find_box(s, &name)?;
        let branch = query.branch_or(&target);
        Ok(s.meta.list_commits(&target.id, &branch, query.limit())?)
    })
    .await?;
    Ok(Json(commits))
}

/// GET /v0/boxes/:box/commits/latest
pub async fn latest_commit(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(query): Query<CommitsQuery>,
) -> ServerResult<Json<Commit>> {
    let commit = blocking(&state, move |s| {
        let target = find_box(s, &name)?;
        let branch = query.branch_or(&target);
        s.meta
            .latest_commit(&target.id, &branch)?
            .ok_or_else(|| ServerError::NotFound(format!("branch {branch} has no commits")))
    })
    .await?;
    Ok(Json(commit))
}

/// GET /v0/boxes/:box/tree/:commit_id
pub async fn commit_tree(
    State(state): State<SharedState>,
    Path((name, commit_id)): Path<(String, String)>,
) -> ServerResult<Json<Vec<Entry>>> {
    let entries = blocking(&state, move |s| {
        let target = find_box(s, &name)?;
        let commit_id = CommitId::from(commit_id);
        match s.meta.get_commit(&commit_id)? {
            Some(commit) if commit.box_id == target.id => Ok(commit.entries),
            _ => Err(ServerError::NotFound(format!("commit {commit_id}"))),
        }
    })
    .await?;
    Ok(Json(entries))
}

/// HEAD /v0/blobs/:hash
pub async fn blob_exists(
    State(state): State<SharedState>,
    Path(hash): Path<String>,
) -> ServerResult<StatusCode> {
    let hash = BlobHash::parse(hash)?;
    let found = blocking(&state, move |s| Ok(s.blobs.has(&hash)?)).await?;
    Ok(if found {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    })
}

/// PUT /v0/blobs/:hash
///
/// Streams exactly `Content-Length` bytes of the body into the store under
/// `hash`.
pub async fn upload_blob(
    State(state): State<SharedState>,
    Path(hash): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> ServerResult<StatusCode> {
    let hash = BlobHash::parse(hash)?;
    let declared = headers
        .get(CONTENT_LENGTH)
        .ok_or(ServerError::LengthRequired)?
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| ServerError::BadRequest("invalid Content-Length".into()))?;
    if declared > state.max_blob_size {
        return Err(ServerError::PayloadTooLarge {
            size: declared,
            limit: state.max_blob_size,
        });
    }

    let stored = hash.clone();
    let mut reader = blocking_reader(body);
    blocking(&state, move |s| {
        s.blobs.put(&stored, &mut reader, declared)?;
        Ok(())
    })
    .await?;
    tracing::debug!(hash = %hash.short_hex(), size = declared, "blob uploaded");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
}

/// Whether an `If-None-Match` value matches `etag` under weak comparison.
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let wanted = opaque(etag);
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || opaque(candidate) == wanted)
}

/// An opened file, positioned and bounded for the response.
enum FileBody {
    Full {
        size: u64,
        reader: Box<dyn BlobRead>,
    },
    Partial {
        range: Range<u64>,
        size: u64,
        reader: Take<Box<dyn BlobRead>>,
    },
    Unsatisfiable {
        size: u64,
    },
}

fn read_file(state: &AppState, hash: &BlobHash, range: Option<ByteRange>) -> ServerResult<FileBody> {
    let mut blob = state
        .blobs
        .open(hash)?
        .ok_or_else(|| ServerError::NotFound(format!("blob {hash}")))?;
    let size = blob.size;

    let Some(range) = range else {
        return Ok(FileBody::Full {
            size,
            reader: blob.reader,
        });
    };
    let Some(range) = range.resolve(size) else {
        return Ok(FileBody::Unsatisfiable { size });
    };

    blob.reader.seek(SeekFrom::Start(range.start))?;
    let reader = blob.reader.take(range.end - range.start);
    Ok(FileBody::Partial {
        range,
        size,
        reader,
    })
}

/// GET /v0/files/:commit_id?path=
pub async fn fetch_file(
    State(state): State<SharedState>,
    Path(commit_id): Path<String>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ServerError::BadRequest("path query parameter is required".into()))?;

    let entry = blocking(&state, move |s| {
        let commit_id = CommitId::from(commit_id);
        let commit = s
            .meta
            .get_commit(&commit_id)?
            .ok_or_else(|| ServerError::NotFound(format!("commit {commit_id}")))?;
        commit
            .entry(&path)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("path {path}")))
    })
    .await?;

    let etag = entry.sha256.weak_etag();
    let mut out = HeaderMap::new();
    out.insert(ETAG, header_value(etag.clone())?);

    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag_matches(v, &etag));
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, out).into_response());
    }

    let range = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(ByteRange::parse);
    let hash = entry.sha256;
    let body = blocking(&state, move |s| read_file(s, &hash, range)).await?;

    out.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    let (status, data) = match body {
        FileBody::Full { size, reader } => {
            out.insert(CONTENT_LENGTH, HeaderValue::from(size));
            (StatusCode::OK, streamed(reader))
        }
        FileBody::Partial {
            range,
            size,
            reader,
        } => {
            out.insert(CONTENT_RANGE, header_value(content_range(&range, size))?);
            out.insert(CONTENT_LENGTH, HeaderValue::from(range.end - range.start));
            (StatusCode::PARTIAL_CONTENT, streamed(reader))
        }
        FileBody::Unsatisfiable { size } => {
            out.insert(CONTENT_RANGE, header_value(unsatisfied_range(size))?);
            let err = serde_json::json!({ "error": "requested range not satisfiable" });
            return Ok((StatusCode::RANGE_NOT_SATISFIABLE, out, Json(err)).into_response());
        }
    };
    out.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    Ok((status, out, data).into_response())
}
