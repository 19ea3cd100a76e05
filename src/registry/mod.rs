mod walker;

pub use walker::Registry;

use crate::application::Application;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// An application record together with the registry file it came from.
#[derive(Debug, Clone)]
pub struct ApplicationFile {
    /// Path of the JSON record inside the registry checkout.
    pub path: PathBuf,

    /// The deserialized record.
    pub application: Application,
}

impl ApplicationFile {
    /// Short display label: the applicant name, falling back to the file name.
    pub fn label(&self) -> String {
        let name = self.application.client.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Load a single application record from a JSON file.
pub fn load_application<P: AsRef<Path>>(path: P) -> Result<Application> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read application file: {}", path.display()))?;

    let application: Application = serde_json::from_str(&content)
        .with_context(|| format!("Not an application record: {}", path.display()))?;

    Ok(application)
}
