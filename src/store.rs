use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{
    NewRevision, Revision, RevisionId, RevisionPayload, TIMESTAMP_FORMAT, format_timestamp,
};

const INDEX_FILENAME: &str = "index.json";
const IGNORED_FILENAME: &str = "ignored.txt";
const REVISIONS_DIRNAME: &str = "revisions";
const CONTENT_FILENAME: &str = "content.txt";
const CHANGELIST_FILENAME: &str = "changelist.txt";

/// Durable store for revision records.
///
/// Metadata rows and the watched-document registry live in one JSON index
/// committed atomically as a unit; content and changelist payloads live in
/// one directory per revision, named by the capture timestamp. Payloads are
/// written before the index row, so a revision only becomes queryable once
/// its metadata commit lands; orphaned payload directories from interrupted
/// creates are discarded when the store is opened.
#[derive(Clone)]
pub struct RevisionStore {
    base: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct Index {
    version: u32,
    next_id: u64,
    watched: Vec<String>,
    revisions: Vec<Revision>,
}

impl Index {
    fn empty() -> Self {
        Index {
            version: 1,
            next_id: 1,
            watched: Vec::new(),
            revisions: Vec::new(),
        }
    }
}

impl RevisionStore {
    pub fn open(base: &Path) -> Result<Self> {
        let store = Self {
            base: base.to_path_buf(),
        };
        fs::create_dir_all(store.revisions_dir()).map_err(|err| {
            Error::io(
                format!("create revisions dir {}", store.revisions_dir().display()),
                err,
            )
        })?;
        if !store.index_path().exists() {
            store.write_index(&Index::empty())?;
        }
        if !store.ignored_path().exists() {
            write_atomic(&store.ignored_path(), b"").map_err(|err| {
                Error::io(
                    format!("create ignore list {}", store.ignored_path().display()),
                    err,
                )
            })?;
        }
        store.discard_orphaned_payloads()?;
        Ok(store)
    }

    fn index_path(&self) -> PathBuf {
        self.base.join(INDEX_FILENAME)
    }

    fn ignored_path(&self) -> PathBuf {
        self.base.join(IGNORED_FILENAME)
    }

    fn revisions_dir(&self) -> PathBuf {
        self.base.join(REVISIONS_DIRNAME)
    }

    fn payload_dir(&self, document_key: &str, captured_at: PrimitiveDateTime) -> Result<PathBuf> {
        let timestamp = format_timestamp(captured_at)
            .map_err(|err| Error::persistence(format!("format capture timestamp: {err}")))?;
        Ok(self.revisions_dir().join(document_key).join(timestamp))
    }

    fn read_index(&self) -> Result<Index> {
        let path = self.index_path();
        let bytes =
            fs::read(&path).map_err(|err| Error::io(format!("read {}", path.display()), err))?;
        let index: Index = serde_json::from_slice(&bytes)
            .map_err(|err| Error::persistence(format!("parse {}: {err}", path.display())))?;
        if index.version != 1 {
            return Err(Error::persistence(format!(
                "unsupported index version {}",
                index.version
            )));
        }
        Ok(index)
    }

    fn write_index(&self, index: &Index) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|err| Error::persistence(format!("serialize index: {err}")))?;
        write_atomic(&self.index_path(), &bytes).map_err(|err| {
            Error::persistence(format!("write {}: {err}", self.index_path().display()))
        })
    }

    /// Persist a new revision and return it with its assigned id.
    ///
    /// Ids are monotonically assigned in creation order. New revisions start
    /// with zero completions and unhidden.
    pub fn create_revision(&self, new: NewRevision) -> Result<Revision> {
        let mut index = self.read_index()?;

        let dir = self.payload_dir(&new.document_key, new.captured_at)?;
        if dir.exists() {
            return Err(Error::persistence(format!(
                "revision payload directory already exists: {}",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)
            .map_err(|err| Error::persistence(format!("create {}: {err}", dir.display())))?;

        let content_path = dir.join(CONTENT_FILENAME);
        write_atomic(&content_path, new.content.as_bytes()).map_err(|err| {
            Error::persistence(format!("write {}: {err}", content_path.display()))
        })?;
        let changelist_path = dir.join(CHANGELIST_FILENAME);
        write_atomic(&changelist_path, encode_changelist(&new.changelist).as_bytes()).map_err(
            |err| Error::persistence(format!("write {}: {err}", changelist_path.display())),
        )?;

        let revision = Revision {
            id: RevisionId(index.next_id),
            document_key: new.document_key,
            captured_at: new.captured_at,
            scheduled_date: new.scheduled_date,
            completions_done: 0,
            hidden: false,
            payload: Some(RevisionPayload {
                content: new.content,
                changelist: new.changelist,
            }),
        };

        index.next_id += 1;
        index.revisions.push(revision.clone());
        self.write_index(&index)?;
        Ok(revision)
    }

    /// All revisions for one document, ordered by capture time ascending
    /// (id as tiebreak). Payloads are loaded only when `include_content` is
    /// set, so existence checks stay cheap.
    pub fn list_by_document(
        &self,
        document_key: &str,
        include_content: bool,
    ) -> Result<Vec<Revision>> {
        let index = self.read_index()?;
        let mut revisions: Vec<Revision> = index
            .revisions
            .into_iter()
            .filter(|revision| revision.document_key == document_key)
            .collect();
        revisions.sort_by_key(|revision| (revision.captured_at, revision.id));
        if include_content {
            for revision in &mut revisions {
                self.load_payload(revision)?;
            }
        }
        Ok(revisions)
    }

    pub fn get_by_id(&self, id: RevisionId) -> Result<Revision> {
        let index = self.read_index()?;
        let mut revision = index
            .revisions
            .into_iter()
            .find(|revision| revision.id == id)
            .ok_or(Error::NotFound(id))?;
        self.load_payload(&mut revision)?;
        Ok(revision)
    }

    /// All revisions scheduled on or before `date`, payloads included.
    pub fn list_due_by(&self, date: Date) -> Result<Vec<Revision>> {
        let index = self.read_index()?;
        let mut due: Vec<Revision> = index
            .revisions
            .into_iter()
            .filter(|revision| revision.scheduled_date <= date)
            .collect();
        due.sort_by_key(|revision| (revision.scheduled_date, revision.id));
        for revision in &mut due {
            self.load_payload(revision)?;
        }
        Ok(due)
    }

    /// Every revision's metadata, in id order. Payloads are not loaded.
    pub fn all_revisions(&self) -> Result<Vec<Revision>> {
        let mut revisions = self.read_index()?.revisions;
        revisions.sort_by_key(|revision| revision.id);
        Ok(revisions)
    }

    pub fn update_schedule(
        &self,
        id: RevisionId,
        new_date: Date,
        bump_completion: bool,
    ) -> Result<Revision> {
        let mut index = self.read_index()?;
        let revision = index
            .revisions
            .iter_mut()
            .find(|revision| revision.id == id)
            .ok_or(Error::NotFound(id))?;
        revision.scheduled_date = new_date;
        if bump_completion {
            revision.completions_done += 1;
        }
        let updated = revision.clone();
        self.write_index(&index)?;
        Ok(updated)
    }

    pub fn set_hidden(&self, id: RevisionId, hidden: bool) -> Result<()> {
        let mut index = self.read_index()?;
        let revision = index
            .revisions
            .iter_mut()
            .find(|revision| revision.id == id)
            .ok_or(Error::NotFound(id))?;
        revision.hidden = hidden;
        self.write_index(&index)
    }

    pub fn watched_keys(&self) -> Result<Vec<String>> {
        Ok(self.read_index()?.watched)
    }

    /// Register a document for tracking and allocate its history location.
    pub fn allocate_watch(&self, document_key: &str) -> Result<()> {
        if document_key.is_empty() || document_key.contains(['/', '\\']) {
            return Err(Error::Configuration(format!(
                "document key {document_key:?} must be a plain file name"
            )));
        }
        let mut index = self.read_index()?;
        if index.watched.iter().any(|key| key == document_key) {
            return Err(Error::AlreadyWatched(document_key.to_string()));
        }
        index.watched.push(document_key.to_string());
        self.write_index(&index)?;

        let dir = self.revisions_dir().join(document_key);
        fs::create_dir_all(&dir)
            .map_err(|err| Error::io(format!("create {}", dir.display()), err))?;
        Ok(())
    }

    pub fn ignored_keys(&self) -> Result<Vec<String>> {
        let path = self.ignored_path();
        let text = fs::read_to_string(&path)
            .map_err(|err| Error::io(format!("read {}", path.display()), err))?;
        Ok(text
            .lines()
            .map(|line| line.trim_end().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    pub fn add_ignored(&self, document_keys: &[String]) -> Result<()> {
        let path = self.ignored_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| Error::io(format!("open {}", path.display()), err))?;
        for key in document_keys {
            writeln!(file, "{key}")
                .map_err(|err| Error::io(format!("append to {}", path.display()), err))?;
        }
        Ok(())
    }

    /// Load a revision's content and changelist from its payload directory.
    pub fn load_payload(&self, revision: &mut Revision) -> Result<()> {
        if revision.payload.is_some() {
            return Ok(());
        }
        let dir = self.payload_dir(&revision.document_key, revision.captured_at)?;

        let content_path = dir.join(CONTENT_FILENAME);
        let content = fs::read_to_string(&content_path)
            .map_err(|err| Error::io(format!("read {}", content_path.display()), err))?;

        let changelist_path = dir.join(CHANGELIST_FILENAME);
        let raw = fs::read_to_string(&changelist_path)
            .map_err(|err| Error::io(format!("read {}", changelist_path.display()), err))?;
        let changelist = parse_changelist(&raw)?;

        revision.payload = Some(RevisionPayload {
            content,
            changelist,
        });
        Ok(())
    }

    // A payload directory with no matching metadata row is the residue of an
    // interrupted create; the revision was never published, so the payload
    // can go. Directories whose names don't parse as capture timestamps are
    // left alone.
    fn discard_orphaned_payloads(&self) -> Result<()> {
        let index = self.read_index()?;
        let mut live: HashSet<(String, String)> = HashSet::new();
        for revision in &index.revisions {
            let timestamp = format_timestamp(revision.captured_at)
                .map_err(|err| Error::persistence(format!("format capture timestamp: {err}")))?;
            live.insert((revision.document_key.clone(), timestamp));
        }

        let revisions_dir = self.revisions_dir();
        let entries = fs::read_dir(&revisions_dir)
            .map_err(|err| Error::io(format!("read {}", revisions_dir.display()), err))?;
        for entry in entries {
            let entry = entry
                .map_err(|err| Error::io(format!("read entry in {}", revisions_dir.display()), err))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(document_key) = entry.file_name().into_string() else {
                continue;
            };
            let sub_entries = fs::read_dir(entry.path())
                .map_err(|err| Error::io(format!("read {}", entry.path().display()), err))?;
            for sub in sub_entries {
                let sub = sub
                    .map_err(|err| Error::io(format!("read entry in {}", entry.path().display()), err))?;
                if !sub.path().is_dir() {
                    continue;
                }
                let Ok(timestamp) = sub.file_name().into_string() else {
                    continue;
                };
                if PrimitiveDateTime::parse(&timestamp, TIMESTAMP_FORMAT).is_err() {
                    continue;
                }
                if !live.contains(&(document_key.clone(), timestamp.clone())) {
                    warn!(
                        document = %document_key,
                        %timestamp,
                        "discarding orphaned revision payload"
                    );
                    fs::remove_dir_all(sub.path()).map_err(|err| {
                        Error::io(format!("remove {}", sub.path().display()), err)
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn encode_changelist(changelist: &[usize]) -> String {
    changelist
        .iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_changelist(raw: &str) -> Result<Vec<usize>> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<usize>()
                .map_err(|err| Error::persistence(format!("bad changelist entry {line:?}: {err}")))
        })
        .collect()
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changelist_encoding_round_trips() {
        let changelist = vec![0, 3, 17];
        assert_eq!(encode_changelist(&changelist), "0\n3\n17");
        assert_eq!(parse_changelist("0\n3\n17").unwrap(), changelist);
        assert_eq!(parse_changelist("").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_changelist("2\n").unwrap(), vec![2]);
    }

    #[test]
    fn garbage_changelist_is_a_persistence_error() {
        assert!(matches!(
            parse_changelist("0\nnope"),
            Err(Error::Persistence(_))
        ));
    }
}
