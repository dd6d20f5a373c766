//! Resource map — the fixed set of URL paths the server answers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use bandgate_core::config::ResourceConfig;

#[derive(Debug, Clone)]
pub struct ResourceMap {
    root: PathBuf,
    routes: BTreeMap<String, PathBuf>,
}

impl ResourceMap {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            routes: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ResourceConfig) -> Self {
        let mut map = Self::new(&config.root);
        for (path, file) in &config.routes {
            map.insert(path.clone(), file.clone());
        }
        map
    }

    /// Map `url_path` to `file`, relative to the root unless absolute.
    pub fn insert(&mut self, url_path: impl Into<String>, file: impl Into<PathBuf>) {
        self.routes.insert(url_path.into(), file.into());
    }

    /// File behind an exact URL path match.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        self.routes.get(url_path).map(|file| self.root.join(file))
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
