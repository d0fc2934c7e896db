use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::sitemap::{parse_sitemap, SITEMAP};

/// The page a new store starts with.
pub const SEED_INDEX_HTML: &str = "\
<!DOCTYPE html>
<html>
  <head>
    <meta charset=\"utf-8\">
    <title>My website</title>
  </head>
  <body>
    <h1>Hello!</h1>
    <p>Describe the website you want and it will appear here.</p>
  </body>
</html>
";

/// A named file of the website.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    /// The path of the file, segments separated by `/`.
    pub name: String,
    /// The content of the file.
    pub content: String,
}

/// Whether [`ArtifactStore::upsert`] added a new artifact or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The name was not in the store yet.
    Inserted,
    /// The content of an existing artifact was replaced.
    Replaced,
}

/// The files of a website, keyed by name, in order of first insertion.
///
/// Cloning a store is cheap and yields a handle to the same artifacts. Mutations are serialized,
/// so a store can be shared by concurrent round-trips.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    inner: Arc<RwLock<IndexMap<String, String>>>,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore {
    /// Constructs a store that contains only the seed `index.html`.
    pub fn new() -> Self {
        let store = Self::empty();
        store.reset();
        store
    }

    /// Constructs a store without any artifacts.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Sets the content of `name`. A new name is appended after all existing names, an existing
    /// name keeps its position.
    pub fn upsert(&self, name: impl Into<String>, content: impl Into<String>) -> Upsert {
        let name = name.into();
        let content = content.into();
        let mut inner = self.inner.write();
        match inner.insert(name, content) {
            None => Upsert::Inserted,
            Some(_) => Upsert::Replaced,
        }
    }

    /// Returns the content of `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().get(name).cloned()
    }

    /// Returns true if an artifact called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Returns the names of all artifacts in order of first insertion.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Returns the number of artifacts.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the store holds no artifacts.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a copy of all artifacts in order of first insertion.
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.inner
            .read()
            .iter()
            .map(|(name, content)| Artifact {
                name: name.clone(),
                content: content.clone(),
            })
            .collect()
    }

    /// Removes all artifacts and puts the seed `index.html` back.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.clear();
        inner.insert("index.html".to_string(), SEED_INDEX_HTML.to_string());
    }

    /// Returns the files listed by the sitemap artifact, or nothing if there is no sitemap.
    pub fn expected_files(&self) -> Vec<String> {
        self.get(SITEMAP)
            .map(|content| parse_sitemap(&content))
            .unwrap_or_default()
    }

    /// Returns the files listed by the sitemap that are not in the store yet.
    pub fn pending(&self) -> Vec<String> {
        let expected = self.expected_files();
        let inner = self.inner.read();
        expected
            .into_iter()
            .filter(|name| !inner.contains_key(name))
            .collect()
    }

    /// Returns true if every file listed by the sitemap is present.
    pub fn is_ready(&self) -> bool {
        self.pending().is_empty()
    }
}
