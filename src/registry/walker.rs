use super::ApplicationFile;
use crate::application::Application;
use anyhow::Result;
use crossbeam::channel::{self, Receiver};
use ignore::{WalkBuilder, WalkState};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

/// Walks a local allocator-registry checkout for application records.
pub struct Registry {
    /// Root of the registry checkout
    root: PathBuf,

    /// Whether to respect .gitignore files
    respect_gitignore: bool,

    /// Maximum depth to walk (None = unlimited)
    max_depth: Option<usize>,

    /// Directories to always exclude from walking (by basename)
    exclude_dirs: HashSet<String>,
}

impl Registry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            respect_gitignore: false,
            max_depth: None,
            exclude_dirs: HashSet::new(),
        }
    }

    /// Set directories to exclude from walking (by basename)
    pub fn exclude_dirs(mut self, dirs: &[String]) -> Self {
        self.exclude_dirs = dirs.iter().cloned().collect();
        self
    }

    /// Set whether to respect .gitignore files (default: false)
    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Set maximum walk depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Walk the registry and return every application record found, sorted by
    /// path. JSON files that are not application records are skipped.
    pub fn scan(&self) -> Result<Vec<ApplicationFile>> {
        let mut applications: Vec<ApplicationFile> = self
            .collect_candidates()
            .into_iter()
            .filter_map(|path| parse_record(&path))
            .collect();

        applications.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(applications)
    }

    /// Walk the registry, then stream records as they parse.
    ///
    /// Returns `(candidate_count, receiver)`: the number of JSON files found
    /// (for progress calculation) and a channel yielding each file that turns
    /// out to be an application record.
    pub fn scan_with_streaming(&self) -> Result<(usize, Receiver<ApplicationFile>)> {
        let mut candidates = self.collect_candidates();
        candidates.sort();
        let total_count = candidates.len();

        let (tx, rx) = channel::unbounded();
        thread::spawn(move || {
            for path in candidates {
                if let Some(record) = parse_record(&path) {
                    if tx.send(record).is_err() {
                        break;
                    }
                }
            }
        });

        Ok((total_count, rx))
    }

    /// Parallel walk collecting candidate JSON file paths.
    fn collect_candidates(&self) -> Vec<PathBuf> {
        let results = Arc::new(Mutex::new(Vec::new()));

        let mut walker = WalkBuilder::new(&self.root);
        let exclude_dirs = self.exclude_dirs.clone();
        walker
            .hidden(false)
            .ignore(self.respect_gitignore)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .filter_entry(move |entry| {
                let file_name = entry.file_name().to_string_lossy();
                !matches!(file_name.as_ref(), ".git" | ".svn" | ".hg")
                    && !exclude_dirs.contains(file_name.as_ref())
            });

        if let Some(depth) = self.max_depth {
            walker.max_depth(Some(depth));
        }

        walker.threads(num_cpus::get());

        walker.build_parallel().run(|| {
            let results = Arc::clone(&results);
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return WalkState::Continue,
                };

                if !entry.file_type().map_or(false, |ft| ft.is_file()) {
                    return WalkState::Continue;
                }

                let path = entry.path();
                if path.extension().map_or(false, |ext| ext == "json") {
                    results.lock().unwrap().push(path.to_path_buf());
                }

                WalkState::Continue
            })
        });

        Arc::try_unwrap(results).unwrap().into_inner().unwrap()
    }
}

fn parse_record(path: &Path) -> Option<ApplicationFile> {
    let content = fs::read_to_string(path).ok()?;
    let application: Application = serde_json::from_str(&content).ok()?;
    Some(ApplicationFile {
        path: path.to_path_buf(),
        application,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::application_json;
    use tempfile::TempDir;

    fn seed_registry(temp: &TempDir) {
        let apps = temp.path().join("applications");
        fs::create_dir_all(apps.join("nested")).unwrap();
        fs::write(
            apps.join("f1aaa.json"),
            application_json("Alpha", "10PiB", "1PiB"),
        )
        .unwrap();
        fs::write(
            apps.join("nested").join("f1bbb.json"),
            application_json("Beta", "5PiB", "500TiB"),
        )
        .unwrap();
        // Not application records:
        fs::write(apps.join("package.json"), r#"{"name": "site"}"#).unwrap();
        fs::write(apps.join("notes.txt"), "not json").unwrap();
    }

    #[test]
    fn scan_finds_only_application_records() {
        let temp = TempDir::new().unwrap();
        seed_registry(&temp);

        let applications = Registry::new(temp.path()).scan().unwrap();
        let mut names: Vec<String> = applications
            .iter()
            .map(|a| a.application.client.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn scan_respects_exclude_dirs() {
        let temp = TempDir::new().unwrap();
        seed_registry(&temp);

        let applications = Registry::new(temp.path())
            .exclude_dirs(&[String::from("nested")])
            .scan()
            .unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].application.client.name, "Alpha");
    }

    #[test]
    fn scan_respects_max_depth() {
        let temp = TempDir::new().unwrap();
        seed_registry(&temp);

        // Depth 2 reaches applications/ but not applications/nested/.
        let applications = Registry::new(temp.path()).max_depth(2).scan().unwrap();
        assert_eq!(applications.len(), 1);
    }

    #[test]
    fn streaming_reports_candidate_count() {
        let temp = TempDir::new().unwrap();
        seed_registry(&temp);

        let (total, rx) = Registry::new(temp.path()).scan_with_streaming().unwrap();
        // Three .json candidates, two of which are records.
        assert_eq!(total, 3);
        assert_eq!(rx.iter().count(), 2);
    }
}
