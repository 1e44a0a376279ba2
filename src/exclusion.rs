//! File-backed phone-number exclusion list.
//!
//! Grounded in `exclusion_list.py`/`util.py`'s `get_exclusion_list` /
//! `add_exclusion_list` / `delete_exclusion_list`: one number per line, with
//! commas inside a line treated as additional separators on load.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use log::{info, warn};

/// The set of sender numbers the orchestrator should silently drop.
#[async_trait]
pub trait ExclusionSet: Send + Sync {
    async fn contains(&self, number: &str) -> bool;
    async fn add(&self, number: &str);
    /// Returns `false` if `number` was not present.
    async fn remove(&self, number: &str) -> bool;
    async fn list(&self) -> Vec<String>;
}

pub struct FileExclusionSet {
    path: PathBuf,
    numbers: RwLock<HashSet<String>>,
}

impl FileExclusionSet {
    /// Load from `path`, tolerating a missing file (starts empty, matching
    /// the teacher's tolerant-default config-loading style).
    pub fn load(path: PathBuf) -> Self {
        let numbers = match fs::read_to_string(&path) {
            Ok(contents) => parse_exclusion_file(&contents),
            Err(e) => {
                warn!("exclusion list {:?} not readable ({}); starting empty", path, e);
                HashSet::new()
            }
        };
        info!("loaded {} excluded number(s) from {:?}", numbers.len(), path);
        Self {
            path,
            numbers: RwLock::new(numbers),
        }
    }

    fn rewrite(&self, numbers: &HashSet<String>) {
        let body = numbers.iter().cloned().collect::<Vec<_>>().join("\n");
        if let Err(e) = fs::write(&self.path, body + "\n") {
            warn!("failed to rewrite exclusion list {:?}: {}", self.path, e);
        }
    }
}

fn parse_exclusion_file(contents: &str) -> HashSet<String> {
    contents
        .trim()
        .lines()
        .flat_map(|line| line.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl ExclusionSet for FileExclusionSet {
    async fn contains(&self, number: &str) -> bool {
        self.numbers.read().unwrap().contains(number)
    }

    async fn add(&self, number: &str) {
        let mut numbers = self.numbers.write().unwrap();
        if numbers.insert(number.to_string()) {
            // Append, matching the original's `add_exclusion_list` append-only write.
            use std::io::Write;
            if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&self.path) {
                let _ = writeln!(file, "{number}");
            }
        }
    }

    async fn remove(&self, number: &str) -> bool {
        let mut numbers = self.numbers.write().unwrap();
        let removed = numbers.remove(number);
        if removed {
            self.rewrite(&numbers);
        }
        removed
    }

    async fn list(&self) -> Vec<String> {
        self.numbers.read().unwrap().iter().cloned().collect()
    }
}
