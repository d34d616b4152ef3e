//! In-memory remote used by unit tests
//!
//! Counts every capability call and can simulate the two races the core has
//! to survive: a concurrent branch creator and a concurrent file writer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{BranchRef, FileRevision, FileWrite, RepositoryRef, RevisionMarker};
use crate::remote::{ContentStore, RefStore};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    version: u32,
}

impl StoredFile {
    fn marker(&self) -> RevisionMarker {
        RevisionMarker::new(format!("M{}", self.version))
    }
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    refs: Mutex<HashMap<(String, String), String>>,
    files: Mutex<HashMap<(String, String), StoredFile>>,
    concurrent_writes: Mutex<VecDeque<Vec<u8>>>,
    observed_markers: Mutex<Vec<Option<RevisionMarker>>>,
    race_branch_creation: AtomicBool,
    fail_ref_lookups: AtomicBool,
    pub get_ref_calls: AtomicUsize,
    pub create_ref_calls: AtomicUsize,
    pub get_file_calls: AtomicUsize,
    pub put_file_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(self, repo: &RepositoryRef, branch: &str, commit: &str) -> Self {
        self.refs
            .lock()
            .unwrap()
            .insert((repo.full_name(), branch.to_string()), commit.to_string());
        self
    }

    /// Seed a file at version 1, i.e. marker `M1`
    pub fn with_file(self, branch: &str, path: &str, content: &[u8]) -> Self {
        self.files.lock().unwrap().insert(
            (branch.to_string(), path.to_string()),
            StoredFile {
                content: content.to_vec(),
                version: 1,
            },
        );
        self
    }

    /// Queue a foreign write that lands just before the next `put_file`
    pub fn queue_concurrent_write(&self, content: &[u8]) {
        self.concurrent_writes
            .lock()
            .unwrap()
            .push_back(content.to_vec());
    }

    /// Make the next ref creation lose against an invisible concurrent creator
    pub fn race_branch_creation(&self) {
        self.race_branch_creation.store(true, Ordering::SeqCst);
    }

    pub fn fail_ref_lookups(&self) {
        self.fail_ref_lookups.store(true, Ordering::SeqCst);
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<(Vec<u8>, RevisionMarker)> {
        self.files
            .lock()
            .unwrap()
            .get(&(branch.to_string(), path.to_string()))
            .map(|f| (f.content.clone(), f.marker()))
    }

    pub fn branch_commit(&self, repo: &RepositoryRef, branch: &str) -> Option<String> {
        self.refs
            .lock()
            .unwrap()
            .get(&(repo.full_name(), branch.to_string()))
            .cloned()
    }

    /// Markers seen by each `get_file` call, in order
    pub fn observed_markers(&self) -> Vec<Option<RevisionMarker>> {
        self.observed_markers.lock().unwrap().clone()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn apply_write(
        files: &mut HashMap<(String, String), StoredFile>,
        key: (String, String),
        content: Vec<u8>,
    ) -> RevisionMarker {
        let entry = files.entry(key).or_insert(StoredFile {
            content: Vec::new(),
            version: 0,
        });
        entry.content = content;
        entry.version += 1;
        entry.marker()
    }
}

#[async_trait]
impl RefStore for MemoryRemote {
    async fn get_ref(&self, repo: &RepositoryRef, branch: &str) -> Result<BranchRef> {
        self.get_ref_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_ref_lookups.load(Ordering::SeqCst) {
            return Err(Error::Remote("502 Bad Gateway".to_string()));
        }

        self.branch_commit(repo, branch)
            .map(|commit| BranchRef::new(branch, commit))
            .ok_or_else(|| Error::NotFound(format!("branch '{}' in {}", branch, repo)))
    }

    async fn create_ref(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        commit: &str,
    ) -> Result<BranchRef> {
        self.create_ref_calls.fetch_add(1, Ordering::SeqCst);

        let mut refs = self.refs.lock().unwrap();
        let key = (repo.full_name(), branch.to_string());

        if self.race_branch_creation.swap(false, Ordering::SeqCst) {
            refs.insert(key, commit.to_string());
            return Err(Error::AlreadyExists(format!("branch '{}' in {}", branch, repo)));
        }

        if refs.contains_key(&key) {
            return Err(Error::AlreadyExists(format!("branch '{}' in {}", branch, repo)));
        }

        refs.insert(key, commit.to_string());
        Ok(BranchRef::new(branch, commit))
    }
}

#[async_trait]
impl ContentStore for MemoryRemote {
    async fn get_file(
        &self,
        _repo: &RepositoryRef,
        branch: &BranchRef,
        path: &str,
    ) -> Result<FileRevision> {
        self.get_file_calls.fetch_add(1, Ordering::SeqCst);

        let found = self.file(branch.short_name(), path);
        self.observed_markers
            .lock()
            .unwrap()
            .push(found.as_ref().map(|(_, marker)| marker.clone()));

        found
            .map(|(content, marker)| FileRevision {
                path: path.to_string(),
                content,
                marker,
            })
            .ok_or_else(|| Error::NotFound(format!("{} on {}", path, branch.short_name())))
    }

    async fn put_file(
        &self,
        _repo: &RepositoryRef,
        branch: &BranchRef,
        write: FileWrite<'_>,
    ) -> Result<RevisionMarker> {
        self.put_file_calls.fetch_add(1, Ordering::SeqCst);

        let key = (branch.short_name().to_string(), write.path.to_string());
        let mut files = self.files.lock().unwrap();

        if let Some(foreign) = self.concurrent_writes.lock().unwrap().pop_front() {
            Self::apply_write(&mut files, key.clone(), foreign);
        }

        let current = files.get(&key).map(StoredFile::marker);
        if current.as_ref() != write.expected {
            return Err(Error::MarkerMismatch {
                path: write.path.to_string(),
            });
        }

        Ok(Self::apply_write(&mut files, key, write.content.to_vec()))
    }
}
