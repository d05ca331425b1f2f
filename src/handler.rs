//! Orchestrates placement, append, random-access read, and compaction
//! across a fixed map of buckets.
//!
//! Per spec §5, all buckets share one Handler-wide `RwLock`: read mode
//! for fetches, write mode for inserts and compaction. This is "the
//! simpler realization used by the reference design"; per-bucket locks
//! are a strict improvement spec §9 recommends but does not require.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::{debug, error, warn};

use crate::bucket::Bucket;
use crate::error::{Error, Result};
use crate::idgen;
use crate::model::{Blob, Metadata};
use crate::pathutil;
use crate::placement;
use crate::store::{Cache, MetadataStore};

pub struct Handler {
    buckets: RwLock<HashMap<String, Bucket>>,
    base_dir: PathBuf,
}

impl Handler {
    /// Discovers existing bucket files under `base_dir` and opens each
    /// one. A bucket that fails to open is logged and excluded; the
    /// remaining buckets continue to serve (spec §7 `BucketOpenFailed`
    /// recovery policy).
    pub fn open(base_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        let paths = Bucket::discover(&base_dir)?;

        let mut buckets = HashMap::new();
        for path in paths {
            match Bucket::open(&path) {
                Ok(bucket) => {
                    buckets.insert(bucket.id().to_string(), bucket);
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "excluding unopenable bucket");
                }
            }
        }

        Ok(Handler {
            buckets: RwLock::new(buckets),
            base_dir,
        })
    }

    /// Seeds the handler with a single empty bucket. Used by tests that
    /// need to force every insert into one bucket (spec §8 E1-E3).
    pub fn open_with_single_bucket(base_dir: PathBuf, name: &str) -> Result<Self> {
        let path = base_dir.join(name);
        std::fs::create_dir_all(&base_dir)?;
        let bucket = Bucket::open(&path)?;
        let mut buckets = HashMap::new();
        buckets.insert(bucket.id().to_string(), bucket);
        Ok(Handler {
            buckets: RwLock::new(buckets),
            base_dir,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.read().expect("bucket lock poisoned").len()
    }

    /// Every bucket id currently known to the handler, for callers that
    /// need to sweep the whole set (the pruner's bucket sweep, spec
    /// §4.5) rather than target one bucket in particular.
    pub fn bucket_ids(&self) -> Vec<String> {
        self.buckets
            .read()
            .expect("bucket lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    fn provision(&self, buckets: &mut HashMap<String, Bucket>) -> Result<()> {
        let names = Bucket::generate_names(&self.base_dir, placement::FANOUT);
        for path in names {
            let bucket = Bucket::open(&path)?;
            buckets.insert(bucket.id().to_string(), bucket);
        }
        Ok(())
    }

    /// Picks a target bucket for `min_free` bytes, provisioning a fresh
    /// [`placement::FANOUT`] of buckets first if every existing bucket is
    /// too full (spec §4.2).
    fn select_bucket<'a>(
        &self,
        buckets: &'a mut HashMap<String, Bucket>,
        min_free: u64,
    ) -> Result<&'a mut Bucket> {
        let ids: Vec<String> = buckets.keys().cloned().collect();
        let sizes: Vec<u64> = ids.iter().map(|id| buckets[id].size()).collect();

        if ids.is_empty() || placement::needs_more_buckets(&sizes, min_free) {
            self.provision(buckets)?;
        }

        let ids: Vec<String> = buckets.keys().cloned().collect();
        let sizes: Vec<u64> = ids.iter().map(|id| buckets[id].size()).collect();

        let idx = placement::choose(&sizes, min_free).ok_or_else(|| Error::CompactionAborted {
            bucket: "<none>".to_string(),
            reason: "no buckets available for placement".to_string(),
        })?;

        let id = ids[idx].clone();
        Ok(buckets.get_mut(&id).expect("id came from buckets.keys()"))
    }

    /// Cleans `path`, picks a bucket, appends `content`, and returns the
    /// resulting [`Blob`] and [`Metadata`] descriptors. Does not touch
    /// any metadata index or cache — persisting those is the caller's
    /// job (spec §4.3).
    pub fn insert(&self, path: &str, content: &[u8], user_id: &str) -> Result<(Blob, Metadata)> {
        let cleaned = pathutil::clean(path);
        let name = pathutil::basename(&cleaned);
        let parent = pathutil::dirname(&cleaned);
        let mime = pathutil::guess_mime(&name, content);

        let mut buckets = self.buckets.write().expect("bucket lock poisoned");
        let bucket = self.select_bucket(&mut buckets, content.len() as u64)?;

        let blob = bucket.append(&name, content)?;
        debug!(blob = %blob.id, bucket = %blob.bucket, "appended blob");

        let metadata = Metadata {
            id: idgen::short_id(),
            name,
            path: cleaned,
            parent,
            mime,
            user_id: user_id.to_string(),
            blob: blob.id.clone(),
            created_at: chrono::Utc::now(),
        };

        Ok((blob, metadata))
    }

    /// Opens the descriptor's bucket and reads exactly `size` bytes at
    /// `start`, returning a copy of `blob` with `content` populated.
    /// Checksum verification is the caller's job (spec §4.3).
    pub fn fetch(&self, blob: &Blob) -> Result<Blob> {
        let buckets = self.buckets.read().expect("bucket lock poisoned");
        let bucket = buckets
            .get(&blob.bucket)
            .ok_or_else(|| Error::NotFound(format!("bucket {}", blob.bucket)))?;

        let content = bucket.read_at(blob.start, blob.size)?;

        let mut filled = blob.clone();
        filled.content = Some(content);
        Ok(filled)
    }

    /// Runs the free-space reclamation pass for one bucket (spec §4.4).
    ///
    /// `blobs` is the full, caller-supplied list of this bucket's
    /// descriptors from the metadata index, in any order and without
    /// `content` populated. Returns the same descriptors with `start`
    /// updated (deleted entries keep their original `start` — the
    /// caller is expected to drop those rows from the index).
    pub fn compact(&self, bucket_id: &str, blobs: Vec<Blob>) -> Result<Vec<Blob>> {
        let mut buckets = self.buckets.write().expect("bucket lock poisoned");
        let bucket = buckets
            .get_mut(bucket_id)
            .ok_or_else(|| Error::NotFound(format!("bucket {bucket_id}")))?;

        let mut hydrated = Vec::with_capacity(blobs.len());
        for mut blob in blobs {
            let bytes = bucket.read_at(blob.start, blob.size)?;
            blob.content = Some(bytes);
            hydrated.push(blob);
        }

        hydrated.sort_by_key(|b| b.start);

        match bucket.compact(&mut hydrated) {
            Ok(()) => {
                for blob in hydrated.iter_mut() {
                    blob.content = None;
                }
                Ok(hydrated)
            }
            Err(err) => {
                warn!(bucket = %bucket_id, error = %err, "compaction aborted, bucket may be in an intermediate state");
                Err(err)
            }
        }
    }

    /// Deterministic enumeration of a bucket's live descriptors' ids, so
    /// the orchestrator can evict the right cache entries before
    /// rewriting (spec §4.4 "Cache invalidation").
    pub fn cache_keys_for_bucket(blobs: &[Blob]) -> Vec<String> {
        blobs.iter().map(|b| b.id.clone()).collect()
    }

    /// Lists `user_id`'s metadata rows under `dir`, cleaning the
    /// directory the way `insert` cleans an upload path. No blob bytes
    /// are read — directory listing must not touch bucket files.
    pub async fn list_by_parent(
        &self,
        store: &dyn MetadataStore,
        user_id: &str,
        dir: &str,
    ) -> Result<Vec<Metadata>> {
        let cleaned = pathutil::clean(dir);
        store.list_meta_by_parent(user_id, &cleaned).await
    }

    /// Lists every metadata row belonging to `user_id`, regardless of
    /// directory.
    pub async fn list_by_user(&self, store: &dyn MetadataStore, user_id: &str) -> Result<Vec<Metadata>> {
        store.list_meta_by_user(user_id).await
    }

    /// Tombstones the blob referenced by `meta_id` and removes the
    /// metadata row, enforcing that `meta_id` belongs to `user_id`
    /// (spec.md E5's authorization invariant, generalized from fetch to
    /// delete). Evicts the blob's cache entry so a stale copy can't
    /// survive the tombstone.
    pub async fn delete(
        &self,
        store: &dyn MetadataStore,
        cache: &dyn Cache,
        meta_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let meta = store.get_meta_by_id(meta_id).await?;
        if meta.user_id != user_id {
            return Err(Error::Unauthorized(format!(
                "metadata {meta_id} does not belong to this caller"
            )));
        }

        store.set_blob_deleted(&meta.blob, true).await?;
        store.delete_meta(&meta.id).await?;
        cache.delete_blobs(std::slice::from_ref(&meta.blob)).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn e1_three_inserts_into_one_bucket() {
        let dir = tempdir().unwrap();
        let handler = Handler::open_with_single_bucket(dir.path().to_path_buf(), "b.bucket").unwrap();

        let (blob_a, _) = handler.insert("/x/a", b"aa", "U").unwrap();
        let (blob_b, _) = handler.insert("/x/b", b"bbb", "U").unwrap();
        let (blob_c, _) = handler.insert("/x/c", b"cccc", "U").unwrap();

        assert_eq!(blob_a.start, 0);
        assert_eq!(blob_b.start, 2);
        assert_eq!(blob_c.start, 5);

        let raw = std::fs::read(dir.path().join("b.bucket")).unwrap();
        assert_eq!(raw, b"aabbbcccc");
    }

    #[test]
    fn e2_fetch_round_trips_and_matches_checksum() {
        let dir = tempdir().unwrap();
        let handler = Handler::open_with_single_bucket(dir.path().to_path_buf(), "b.bucket").unwrap();

        let (blob, _) = handler.insert("/x/a", b"hello world", "U").unwrap();
        let fetched = handler.fetch(&blob).unwrap();

        assert_eq!(fetched.content.as_deref(), Some(&b"hello world"[..]));
        assert_eq!(
            crate::checksum::hex_sha256(fetched.content.as_deref().unwrap()),
            blob.checksum
        );
    }

    #[test]
    fn e3_tombstone_then_compact_shrinks_bucket() {
        let dir = tempdir().unwrap();
        let handler = Handler::open_with_single_bucket(dir.path().to_path_buf(), "b.bucket").unwrap();

        let (blob_a, _) = handler.insert("/x/a", b"aa", "U").unwrap();
        let (mut blob_b, _) = handler.insert("/x/b", b"bbb", "U").unwrap();
        let (blob_c, _) = handler.insert("/x/c", b"cccc", "U").unwrap();
        blob_b.deleted = true;

        let result = handler
            .compact(&blob_a.bucket, vec![blob_a.clone(), blob_b, blob_c.clone()])
            .unwrap();

        let raw = std::fs::read(dir.path().join("b.bucket")).unwrap();
        assert_eq!(raw, b"aacccc");

        let survivors: Vec<_> = result.iter().filter(|b| !b.deleted).collect();
        assert_eq!(survivors.len(), 2);
        assert_eq!(survivors[0].start, 0);
        assert_eq!(survivors[1].start, 2);
    }

    #[test]
    fn insert_cleans_path_and_derives_name_parent_mime() {
        let dir = tempdir().unwrap();
        let handler = Handler::open_with_single_bucket(dir.path().to_path_buf(), "b.bucket").unwrap();

        let (_, meta) = handler.insert("/x//y/../z/report.json", b"{}", "U").unwrap();
        assert_eq!(meta.path, "/x/z/report.json");
        assert_eq!(meta.name, "report.json");
        assert_eq!(meta.parent, "/x/z");
        assert_eq!(meta.mime, "application/json");
    }
}
