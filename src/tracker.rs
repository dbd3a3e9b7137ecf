use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::config::Config;
use crate::diff::compute_changelist;
use crate::error::{Error, Result};
use crate::listing;
use crate::model::{self, NewRevision, Revision, RevisionId};
use crate::schedule::SchedulerSet;
use crate::store::RevisionStore;

/// Orchestrates scans over the watched documents and the review lifecycle.
pub struct Tracker {
    config: Config,
    ignored_patterns: Vec<Regex>,
    schedulers: SchedulerSet,
    pub store: RevisionStore,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanOutcome {
    /// Documents for which a new revision was created.
    pub created: usize,
    /// Documents that were checked and had no reviewable change.
    pub unchanged: usize,
    /// Documents skipped with a reason; these never abort the batch.
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Debug, Serialize)]
pub struct SkippedDocument {
    pub document_key: String,
    pub reason: String,
}

impl Tracker {
    pub fn open(config: Config) -> Result<Self> {
        let ignored_patterns = config.compiled_patterns()?;
        let schedulers = SchedulerSet::from_config(&config)?;
        let store = RevisionStore::open(&config.base_dir)?;
        Ok(Self {
            config,
            ignored_patterns,
            schedulers,
            store,
        })
    }

    /// Check every watched document once: documents with no history get a
    /// first revision, the rest are re-diffed against their last revision.
    /// A failure on one document is recorded and the scan moves on.
    pub fn scan(&mut self) -> Result<ScanOutcome> {
        let watched = self.store.watched_keys()?;
        let mut outcome = ScanOutcome::default();

        for document_key in watched {
            match self.scan_document(&document_key) {
                Ok(true) => outcome.created += 1,
                Ok(false) => outcome.unchanged += 1,
                Err(err) => {
                    warn!(document = %document_key, error = %err, "skipping document");
                    outcome.skipped.push(SkippedDocument {
                        document_key,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    fn scan_document(&mut self, document_key: &str) -> Result<bool> {
        let mut history = self.store.list_by_document(document_key, false)?;
        match history.pop() {
            None => {
                self.create_first_revision(document_key)?;
                Ok(true)
            }
            Some(last) => self.check_for_change(last),
        }
    }

    fn create_first_revision(&mut self, document_key: &str) -> Result<()> {
        let path = self.source_path(document_key);
        if !path.exists() {
            return Err(Error::SourceMissing { path });
        }
        let content = read_source(&path)?;

        // Diffed against empty text, so every line is new. An empty document
        // still gets a revision; later scans need the baseline.
        let changelist = compute_changelist("", &content);
        self.persist_revision(document_key, content, changelist)?;
        info!(document = %document_key, "first revision created");
        Ok(())
    }

    fn check_for_change(&mut self, mut last: Revision) -> Result<bool> {
        let path = self.source_path(&last.document_key);
        if !path.exists() {
            return Err(Error::SourceMissing { path });
        }

        // Cheap short-circuit: unless the file's mtime clears the last
        // capture plus the guard window, don't even read it.
        let modified = file_mtime(&path)?;
        let threshold =
            last.captured_at.assume_utc() + Duration::seconds(self.config.guard_seconds);
        if modified <= threshold {
            return Ok(false);
        }

        self.store.load_payload(&mut last)?;
        let previous = last
            .payload
            .as_ref()
            .map(|payload| payload.content.as_str())
            .unwrap_or("");
        let content = read_source(&path)?;

        let changelist = compute_changelist(previous, &content);
        if changelist.is_empty() {
            // Touched, but no line-level change worth reviewing.
            return Ok(false);
        }
        self.persist_revision(&last.document_key, content, changelist)?;
        info!(document = %last.document_key, "revision created");
        Ok(true)
    }

    fn persist_revision(
        &mut self,
        document_key: &str,
        content: String,
        changelist: Vec<usize>,
    ) -> Result<Revision> {
        let scheduled_date = self
            .schedulers
            .for_document(document_key)
            .next_date(0, model::today());
        self.store.create_revision(NewRevision {
            document_key: document_key.to_string(),
            captured_at: model::now_timestamp(),
            scheduled_date,
            content,
            changelist,
        })
    }

    /// Record one completed review: bump the completion count and recompute
    /// the scheduled date from the new count, anchored at today.
    pub fn complete_review(&mut self, id: RevisionId) -> Result<Revision> {
        let revision = self.store.get_by_id(id)?;
        let next = self
            .schedulers
            .for_document(&revision.document_key)
            .next_date(revision.completions_done + 1, model::today());
        self.store.update_schedule(id, next, true)
    }

    /// Revisions due on or before `as_of`, with hidden ones filtered out.
    pub fn due_for_review(&self, as_of: Date) -> Result<Vec<Revision>> {
        Ok(self
            .store
            .list_due_by(as_of)?
            .into_iter()
            .filter(|revision| !revision.hidden)
            .collect())
    }

    pub fn new_documents(&self) -> Result<Vec<String>> {
        let watched = self.store.watched_keys()?;
        let ignored = self.store.ignored_keys()?;
        listing::new_documents(
            &self.config.notes_dir,
            &self.config.recognized_extensions,
            &watched,
            &ignored,
            &self.ignored_patterns,
        )
    }

    /// Start watching every new document. First revisions are not captured
    /// here; the next scan does that.
    pub fn watch_new(&mut self) -> Result<Vec<String>> {
        let new = self.new_documents()?;
        for document_key in &new {
            self.store.allocate_watch(document_key)?;
        }
        Ok(new)
    }

    pub fn ignore_new(&mut self) -> Result<Vec<String>> {
        let new = self.new_documents()?;
        if !new.is_empty() {
            self.store.add_ignored(&new)?;
        }
        Ok(new)
    }

    pub fn set_hidden(&self, id: RevisionId, hidden: bool) -> Result<()> {
        self.store.set_hidden(id, hidden)
    }

    pub fn revision(&self, id: RevisionId) -> Result<Revision> {
        self.store.get_by_id(id)
    }

    pub fn all_revisions(&self) -> Result<Vec<Revision>> {
        self.store.all_revisions()
    }

    fn source_path(&self, document_key: &str) -> PathBuf {
        self.config.notes_dir.join(document_key)
    }
}

fn file_mtime(path: &Path) -> Result<OffsetDateTime> {
    let metadata = fs::metadata(path)
        .map_err(|err| Error::io(format!("stat {}", path.display()), err))?;
    let modified = metadata
        .modified()
        .map_err(|err| Error::io(format!("mtime of {}", path.display()), err))?;
    Ok(OffsetDateTime::from(modified))
}

fn read_source(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).map_err(|err| Error::io(format!("read {}", path.display()), err))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
