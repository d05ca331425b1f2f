//! A single append-only bucket file.
//!
//! Bucket files are raw concatenations of payloads: no headers, footers,
//! or record framing on disk. The metadata index is the sole source of
//! truth for record boundaries (start, size) within a bucket. This mirrors
//! the reference's `fs.Bucket`, generalized with the explicit
//! `pos == size` invariant spec §4.1 requires and the reference never
//! checked.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::checksum::hex_sha256;
use crate::error::{Error, Result};
use crate::idgen;
use crate::model::Blob;

/// An append-only file holding concatenated payloads of many blobs.
///
/// `id` is the bucket's filesystem path, used as the stable identifier
/// embedded in every [`Blob`] descriptor (spec §9 flags decoupling this
/// as a future improvement; it is not required by the invariants this
/// crate implements).
pub struct Bucket {
    id: String,
    path: PathBuf,
    file: File,
    pos: u64,
    size: u64,
}

impl Bucket {
    /// Opens (creating if absent) the bucket file at `path`.
    ///
    /// Fails with [`Error::BucketCorrupt`] if the write cursor and the
    /// stat-reported size disagree, which would mean a previous process
    /// left the file in an inconsistent state.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| Error::BucketOpenFailed {
                path: path.display().to_string(),
                source,
            })?;

        let pos = file
            .seek(SeekFrom::End(0))
            .map_err(|source| Error::BucketOpenFailed {
                path: path.display().to_string(),
                source,
            })?;

        let size = file
            .metadata()
            .map_err(|source| Error::BucketOpenFailed {
                path: path.display().to_string(),
                source,
            })?
            .len();

        if pos != size {
            return Err(Error::BucketCorrupt {
                path: path.display().to_string(),
                pos,
                size,
            });
        }

        let id = path.display().to_string();

        Ok(Bucket {
            id,
            path,
            file,
            pos,
            size,
        })
    }

    /// Generates `n` fresh bucket filenames (8-character random lowercase
    /// tokens with a `.bucket` suffix) under `base_dir`, without creating
    /// the files.
    pub fn generate_names(base_dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|_| base_dir.join(format!("{}.bucket", idgen::short_id())))
            .collect()
    }

    /// Discovers existing bucket files under `base_dir` by scanning for
    /// entries whose name contains `.bucket`.
    pub fn discover(base_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy().contains(".bucket") {
                found.push(entry.path());
            }
        }
        Ok(found)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends `content` under logical `name`, returning a fresh [`Blob`]
    /// descriptor. Fails with [`Error::ShortWrite`] without advancing
    /// `pos` if the underlying write does not consume the whole buffer.
    pub fn append(&mut self, name: &str, content: &[u8]) -> Result<Blob> {
        let start = self.pos;
        let written = self.file.write(content)?;

        if written != content.len() {
            return Err(Error::ShortWrite {
                bucket: self.id.clone(),
                wrote: written,
                requested: content.len(),
            });
        }

        self.pos = start + written as u64;
        self.size = self.pos;

        Ok(Blob {
            id: idgen::short_id(),
            name: name.to_string(),
            bucket: self.id.clone(),
            start,
            size: written as u64,
            checksum: hex_sha256(content),
            deleted: false,
            created_at: chrono::Utc::now(),
            content: None,
        })
    }

    /// Reads exactly `size` bytes starting at `start` from a fresh
    /// read-only handle, so readers never contend with the writer's
    /// cursor on the same bucket.
    pub fn read_at(&self, start: u64, size: u64) -> Result<Vec<u8>> {
        let mut reader = OpenOptions::new().read(true).open(&self.path)?;
        reader.seek(SeekFrom::Start(start))?;

        let mut buf = vec![0u8; size as usize];
        let got = read_fully(&mut reader, &mut buf)?;
        if got as u64 != size {
            return Err(Error::ShortRead {
                bucket: self.id.clone(),
                start,
                expected: size,
                got: got as u64,
            });
        }

        Ok(buf)
    }

    /// Rewrites this bucket's bytes in place, reclaiming space from
    /// tombstoned blobs. `blobs` must already be hydrated (`content`
    /// populated from this bucket's current bytes) and sorted ascending
    /// by `start` — the canonical order that defines the new layout
    /// (spec §4.4 steps 1-2, performed by the caller).
    ///
    /// Deleted entries are left with their original `start` and simply
    /// dropped from the rewritten file; live entries get their `start`
    /// reassigned to their new, gap-free offset. Mutates `blobs` in
    /// place and returns once every surviving blob has been re-appended.
    pub fn compact(&mut self, blobs: &mut [Blob]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|source| Error::CompactionAborted {
                bucket: self.id.clone(),
                reason: source.to_string(),
            })?;

        self.pos = 0;
        self.size = 0;

        let mut cursor = 0u64;

        for blob in blobs.iter_mut() {
            if blob.deleted {
                continue;
            }

            let content = blob
                .content
                .as_ref()
                .ok_or_else(|| Error::CompactionAborted {
                    bucket: self.id.clone(),
                    reason: format!("blob {} was not hydrated before compaction", blob.id),
                })?;

            let written = file
                .write(content)
                .map_err(|source| Error::CompactionAborted {
                    bucket: self.id.clone(),
                    reason: source.to_string(),
                })?;

            if written != content.len() {
                return Err(Error::CompactionAborted {
                    bucket: self.id.clone(),
                    reason: format!(
                        "short write for blob {}: wrote {} of {} bytes",
                        blob.id,
                        written,
                        content.len()
                    ),
                });
            }

            blob.start = cursor;
            cursor += written as u64;
        }

        file.flush().map_err(|source| Error::CompactionAborted {
            bucket: self.id.clone(),
            reason: source.to_string(),
        })?;

        // Re-derive the writer's append handle: the old one's cursor is now
        // stale relative to the truncated file.
        self.file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| Error::BucketOpenFailed {
                path: self.path.display().to_string(),
                source,
            })?;

        self.pos = cursor;
        self.size = cursor;

        Ok(())
    }
}

fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut bucket = Bucket::open(dir.path().join("a.bucket")).unwrap();

        let blob = bucket.append("x", b"hello").unwrap();
        assert_eq!(blob.start, 0);
        assert_eq!(blob.size, 5);
        assert_eq!(blob.checksum, hex_sha256(b"hello"));

        let got = bucket.read_at(blob.start, blob.size).unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn sequential_appends_are_offset_monotonic() {
        let dir = tempdir().unwrap();
        let mut bucket = Bucket::open(dir.path().join("a.bucket")).unwrap();

        let a = bucket.append("a", b"aa").unwrap();
        let b = bucket.append("b", b"bbb").unwrap();
        let c = bucket.append("c", b"cccc").unwrap();

        assert_eq!((a.start, a.size), (0, 2));
        assert_eq!((b.start, b.size), (2, 3));
        assert_eq!((c.start, c.size), (5, 4));
        assert_eq!(bucket.size(), 9);

        let raw = std::fs::read(dir.path().join("a.bucket")).unwrap();
        assert_eq!(raw, b"aabbbcccc");
    }

    #[test]
    fn reopen_preserves_pos_and_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bucket");
        {
            let mut bucket = Bucket::open(&path).unwrap();
            bucket.append("x", b"hello").unwrap();
        }

        let reopened = Bucket::open(&path).unwrap();
        assert_eq!(reopened.size(), 5);
    }

    #[test]
    fn compaction_removes_tombstones_and_closes_gaps() {
        let dir = tempdir().unwrap();
        let mut bucket = Bucket::open(dir.path().join("a.bucket")).unwrap();

        let mut a = bucket.append("a", b"aa").unwrap();
        let mut b = bucket.append("b", b"bbb").unwrap();
        let mut c = bucket.append("c", b"cccc").unwrap();

        b.deleted = true;
        a.content = Some(bucket.read_at(a.start, a.size).unwrap());
        b.content = Some(bucket.read_at(b.start, b.size).unwrap());
        c.content = Some(bucket.read_at(c.start, c.size).unwrap());

        let mut blobs = vec![a, b, c];
        bucket.compact(&mut blobs).unwrap();

        let raw = std::fs::read(dir.path().join("a.bucket")).unwrap();
        assert_eq!(raw, b"aacccc");
        assert_eq!(blobs[0].start, 0);
        assert_eq!(blobs[2].start, 2);
        assert_eq!(bucket.size(), 6);
    }

    #[test]
    fn idempotent_compaction_without_tombstones_is_byte_identical() {
        let dir = tempdir().unwrap();
        let mut bucket = Bucket::open(dir.path().join("a.bucket")).unwrap();

        let mut a = bucket.append("a", b"aa").unwrap();
        let mut b = bucket.append("b", b"bbb").unwrap();

        a.content = Some(bucket.read_at(a.start, a.size).unwrap());
        b.content = Some(bucket.read_at(b.start, b.size).unwrap());

        let before = std::fs::read(dir.path().join("a.bucket")).unwrap();

        let mut blobs = vec![a, b];
        bucket.compact(&mut blobs).unwrap();

        let after = std::fs::read(dir.path().join("a.bucket")).unwrap();
        assert_eq!(before, after);
        assert_eq!(blobs[0].start, 0);
        assert_eq!(blobs[1].start, 2);
    }
}
