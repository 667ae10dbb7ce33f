//! Problem-statement lookup
//!
//! Statements live on disk as `<root>/<practice_id>/<problem_id>.md`, with a
//! `.txt` fallback. Lookups never fail: anything missing or unreadable comes
//! back as an empty string.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait StatementSource: Send + Sync {
    async fn get_statement(&self, practice_id: &str, problem_id: &str) -> String;
}

const EXTENSIONS: [&str; 2] = ["md", "txt"];

pub struct ExerciseDirectory {
    root: PathBuf,
}

impl ExerciseDirectory {
    /// `root` may start with `~`.
    pub fn new(root: &str) -> Self {
        let expanded = shellexpand::tilde(root).into_owned();
        Self {
            root: PathBuf::from(expanded),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, practice_id: &str, problem_id: &str) -> Vec<PathBuf> {
        if !is_plain_id(practice_id) || !is_plain_id(problem_id) {
            return Vec::new();
        }

        let dir = self.root.join(practice_id);
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", problem_id, ext)))
            .collect()
    }
}

/// Rejects ids that could escape the exercise root.
fn is_plain_id(id: &str) -> bool {
    !id.trim().is_empty()
        && !id.contains('/')
        && !id.contains('\\')
        && !id.contains("..")
        && !id.contains('\0')
}

#[async_trait]
impl StatementSource for ExerciseDirectory {
    async fn get_statement(&self, practice_id: &str, problem_id: &str) -> String {
        for path in self.candidates(practice_id, problem_id) {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read statement");
                    return String::new();
                }
            }
        }

        tracing::debug!(
            practice_id = %practice_id,
            problem_id = %problem_id,
            "No statement found"
        );
        String::new()
    }
}
