use std::{
    collections::HashMap,
    sync::{Arc, LockResult, Mutex, MutexGuard},
};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::{debug, warn};

use super::{FrontmatterFile, ReadFromPathError};
use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::options::StoreOptions;
use crate::record::Document;
use crate::store::{QueryResult, Store};

const EXTENSION: &str = "md";

// Let's keep the possible events simpler for our needs
#[derive(Debug, PartialEq)]
enum FsEvent {
    Rename,
    Edit,
    Create,
    Delete,
    Ignored,
    Unhandled(notify::EventKind),
}

impl From<notify::EventKind> for FsEvent {
    fn from(event_kind: notify::EventKind) -> Self {
        use notify::event::{
            AccessKind, AccessMode, CreateKind, DataChange, EventKind, ModifyKind, RemoveKind,
            RenameMode,
        };
        match event_kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => Self::Rename,
            EventKind::Modify(ModifyKind::Data(DataChange::Content | DataChange::Any)) => {
                Self::Edit
            }
            EventKind::Remove(RemoveKind::File) => Self::Delete,
            EventKind::Create(CreateKind::File) => Self::Create,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Self::Ignored,
            unhandled => Self::Unhandled(unhandled),
        }
    }
}

fn has_extension(path: &Utf8Path) -> bool {
    path.extension() == Some(EXTENSION)
}

fn markdown_paths(dir: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut paths = vec![];
    for entry in dir.read_dir_utf8()? {
        let path = entry?.path().to_path_buf();
        if path.is_file() && has_extension(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn load_document(path: &Utf8Path) -> Result<Document, ReadFromPathError> {
    FrontmatterFile::read_from_path(path)?.to_document()
}

/// An in-memory document collection mirroring one directory of frontmatter files.
#[derive(Debug, Default)]
pub struct Keeper {
    pub inner: HashMap<Utf8PathBuf, Document>,
}

#[derive(Debug, thiserror::Error)]
pub enum NewKeeperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to load frontmatter file ({path}): {source}")]
    ReadFrontmatterFromPath {
        path: Utf8PathBuf,
        source: ReadFromPathError,
    },
}

impl Keeper {
    pub fn new(dir: &Utf8Path) -> Result<Self, NewKeeperError> {
        let inner = markdown_paths(dir)?
            .into_iter()
            .map(|path| {
                let doc = load_document(&path).map_err(|source| {
                    NewKeeperError::ReadFrontmatterFromPath {
                        path: path.clone(),
                        source,
                    }
                })?;
                Ok((path, doc))
            })
            .collect::<Result<HashMap<_, _>, NewKeeperError>>()?;
        debug!("Loaded {} documents from {dir}", inner.len());
        Ok(Keeper { inner })
    }

    /// Builds a collection without touching the filesystem; keys are synthesized from `_id`.
    #[must_use]
    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let inner = docs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let id = doc
                    .get("_id")
                    .and_then(Value::as_str)
                    .map_or_else(|| i.to_string(), str::to_owned);
                (Utf8PathBuf::from(format!("{id}.{EXTENSION}")), doc)
            })
            .collect();
        Keeper { inner }
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.inner.values()
    }

    fn matching<'a>(&'a self, criteria: &'a Criteria) -> impl Iterator<Item = &'a Document> {
        self.documents().filter(move |doc| criteria.matches(doc))
    }

    #[must_use]
    pub fn find(&self, criteria: &Criteria, options: &StoreOptions) -> QueryResult {
        let mut docs = self.matching(criteria).collect::<Vec<_>>();
        docs.sort_by(|a, b| options.sort.compare(a, b));

        let total = docs.len();
        let records = docs
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|doc| options.projection.apply(doc.clone()))
            .collect();

        QueryResult { records, total }
    }

    #[must_use]
    pub fn distinct_values(&self, criteria: &Criteria, field: &str) -> Vec<Value> {
        let mut values: Vec<Value> = vec![];
        let flattened = self
            .matching(criteria)
            .filter_map(|doc| doc.get(field))
            .flat_map(|value| match value {
                Value::Array(seq) => seq.clone(),
                scalar => vec![scalar.clone()],
            });
        for value in flattened {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        values
    }
}

#[async_trait]
impl Store for Keeper {
    async fn query(&self, criteria: &Criteria, options: &StoreOptions) -> Result<QueryResult> {
        Ok(self.find(criteria, options))
    }

    async fn distinct(&self, criteria: &Criteria, field: &str) -> Result<Vec<Value>> {
        Ok(self.distinct_values(criteria, field))
    }
}

impl Keeper {
    fn process_rename_event(&mut self, path: &Utf8Path) {
        let was_removed = self.inner.remove(path).is_some();
        if !was_removed {
            let doc = match load_document(path) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!("Couldn't load file ({path:?}) after Rename event: {err}");
                    return;
                }
            };
            self.inner.insert(path.to_owned(), doc);
        }
    }

    fn process_edit_event(&mut self, path: &Utf8Path) {
        let new_doc = match load_document(path) {
            Ok(new_doc) => new_doc,
            Err(err) => {
                warn!("Couldn't load file ({path:?}) after Edit event: {err}");
                return;
            }
        };
        if self.inner.insert(path.to_owned(), new_doc).is_none() {
            debug!("Edit event for untracked ({path:?}); now tracking it.");
        }
    }

    fn process_removal_event(&mut self, path: &Utf8Path) {
        let was_removed = self.inner.remove(path).is_some();
        if !was_removed {
            warn!("Couldn't find ({path:?}) in Remove event.");
        }
    }

    fn process_create_event(&mut self, path: &Utf8Path) {
        if self.inner.contains_key(path) {
            warn!("A Create event occurred for a path ({path:?}) but it already exists in memory.");
            return;
        }
        let new_doc = match load_document(path) {
            Ok(new_doc) => new_doc,
            Err(err) => {
                warn!("Couldn't load file ({path:?}) during Create event: {err}");
                return;
            }
        };
        self.inner.insert(path.to_owned(), new_doc);
    }
}

#[derive(Clone, Default)]
pub struct ArcMutex(pub Arc<Mutex<Keeper>>);

impl ArcMutex {
    #[must_use]
    pub fn new(keeper: Keeper) -> Self {
        Self(Arc::new(Mutex::new(keeper)))
    }

    pub fn lock(&self) -> LockResult<MutexGuard<'_, Keeper>> {
        self.0.as_ref().lock()
    }

    fn locked(&self) -> Result<MutexGuard<'_, Keeper>> {
        self.lock()
            .map_err(|err| Error::store(format!("Failed to lock documents: {err}")))
    }
}

#[async_trait]
impl Store for ArcMutex {
    async fn query(&self, criteria: &Criteria, options: &StoreOptions) -> Result<QueryResult> {
        Ok(self.locked()?.find(criteria, options))
    }

    async fn distinct(&self, criteria: &Criteria, field: &str) -> Result<Vec<Value>> {
        Ok(self.locked()?.distinct_values(criteria, field))
    }
}

impl notify::EventHandler for ArcMutex {
    fn handle_event(&mut self, event: notify::Result<notify::Event>) {
        match event {
            Ok(notify::Event {
                kind,
                paths,
                attrs: _,
            }) => {
                let Some(path) = paths.first() else {
                    warn!("Watch event ({kind:?}) carried no path");
                    return;
                };
                let path = match Utf8PathBuf::try_from(path.clone()) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!("Event filepath ({path:?}) was not UTF-8: {err}\n\nNon-UTF-8 paths not supported.");
                        return;
                    }
                };
                if !has_extension(&path) {
                    return;
                }
                let mut keeper = match self.lock() {
                    Ok(keeper) => keeper,
                    Err(err) => {
                        warn!("Failed to lock documents during notify event: {err}");
                        return;
                    }
                };
                match FsEvent::from(kind) {
                    FsEvent::Rename => keeper.process_rename_event(&path),
                    FsEvent::Edit => keeper.process_edit_event(&path),
                    FsEvent::Delete => keeper.process_removal_event(&path),
                    FsEvent::Create => keeper.process_create_event(&path),
                    FsEvent::Ignored => (),
                    FsEvent::Unhandled(event) => debug!("unhandled watch event: {event:?}"),
                }
            }
            Err(e) => warn!("watch error: {e:?}"),
        }
    }
}
