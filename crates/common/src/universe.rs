use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Supplies the instruments traded in the current session.
pub trait UniverseProvider: Send + Sync {
    fn active_symbols(&self) -> Result<Vec<String>>;
}

/// A fixed list, mostly for tests and manual runs.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse(pub Vec<String>);

impl UniverseProvider for StaticUniverse {
    fn active_symbols(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Reads one instrument per line. Blank lines and `#` comments are skipped,
/// duplicates keep their first position.
#[derive(Debug, Clone)]
pub struct FileUniverse {
    path: PathBuf,
}

impl FileUniverse {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl UniverseProvider for FileUniverse {
    fn active_symbols(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Config(format!(
                "failed to read universe file '{}': {e}",
                self.path.display()
            ))
        })?;
        Ok(parse_universe(&content))
    }
}

fn parse_universe(content: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() || symbols.iter().any(|s| s == line) {
            continue;
        }
        symbols.push(line.to_string());
    }
    symbols
}
