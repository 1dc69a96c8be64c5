//! Turning local files into push entries.

use std::collections::HashSet;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Component, Path};

use anyhow::{bail, Context};
use fbox_types::{BlobHash, Entry};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// SHA-256 and byte length of the file at `path`, streamed.
pub fn hash_file(path: &Path) -> anyhow::Result<(BlobHash, u64)> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok((BlobHash::parse(hex::encode(hasher.finalize()))?, size))
}

#[cfg(unix)]
fn file_mode(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &Metadata) -> u32 {
    fbox_types::DEFAULT_FILE_MODE
}

/// `/`-separated form of a relative path.
fn entry_path(rel: &Path) -> anyhow::Result<String> {
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(s) => parts.push(s),
                None => bail!("path is not valid UTF-8: {}", rel.display()),
            },
            Component::CurDir => {}
            _ => bail!("unsupported path: {}", rel.display()),
        }
    }
    Ok(parts.join("/"))
}

fn entry_for(file: &Path, rel: &Path) -> anyhow::Result<Entry> {
    let meta = fs::metadata(file).with_context(|| format!("cannot stat {}", file.display()))?;
    let (hash, size) = hash_file(file)?;
    Ok(Entry::new(entry_path(rel)?, hash, size).with_mode(file_mode(&meta)))
}

/// Hash every regular file under `roots`, sorted by path.
///
/// A file argument yields an entry named after the file; a directory yields
/// one entry per file inside it, relative to that directory. Symlinks are
/// not followed.
pub fn scan(roots: &[impl AsRef<Path>]) -> anyhow::Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for root in roots {
        let root = root.as_ref();
        let meta = fs::metadata(root).with_context(|| format!("cannot stat {}", root.display()))?;
        if meta.is_file() {
            let name = root
                .file_name()
                .with_context(|| format!("no file name in {}", root.display()))?;
            entries.push(entry_for(root, Path::new(name))?);
            continue;
        }

        for item in WalkDir::new(root).sort_by_file_name() {
            let item = item?;
            if !item.file_type().is_file() {
                continue;
            }
            let rel = item.path().strip_prefix(root)?;
            entries.push(entry_for(item.path(), rel)?);
        }
    }

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.path.as_str()) {
            bail!("two inputs both produce the entry path {:?}", entry.path);
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(files = entries.len(), "scan complete");
    Ok(entries)
}
