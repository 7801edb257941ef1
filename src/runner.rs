//! Drives the catalog through an image service, one prompt at a time.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::catalog::PromptCatalog;
use crate::client::ImageClient;
use crate::error::GenerationError;

/// Anything that can turn a prompt into an image file.
pub trait ImageService {
    /// Generates the image for `id`, returning where it was written.
    fn generate(
        &self,
        id: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<PathBuf, GenerationError>>;
}

impl ImageService for ImageClient {
    fn generate(
        &self,
        id: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<PathBuf, GenerationError>> {
        self.generate_image(id, prompt)
    }
}

/// Terminal state of one item.
#[derive(Debug)]
pub enum OutcomeStatus {
    /// The image was written here
    Succeeded(PathBuf),
    /// Nothing was written
    Failed(GenerationError),
}

/// Result of one generation attempt.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Prompt id
    pub id: String,
    /// How it ended
    pub status: OutcomeStatus,
}

impl GenerationOutcome {
    /// True if an image was written.
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded(_))
    }

    /// Path of the written image, for successes.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.status {
            OutcomeStatus::Succeeded(path) => Some(path),
            OutcomeStatus::Failed(_) => None,
        }
    }

    /// The cause, for failures.
    pub fn error(&self) -> Option<&GenerationError> {
        match &self.status {
            OutcomeStatus::Succeeded(_) => None,
            OutcomeStatus::Failed(err) => Some(err),
        }
    }
}

/// Every outcome of a run, in catalog order.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per prompt attempted
    pub outcomes: Vec<GenerationOutcome>,
}

impl RunReport {
    /// Number of prompts attempted.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Ids that produced an image.
    pub fn succeeded(&self) -> Vec<&str> {
        self.ids_where(true)
    }

    /// Ids that didn't.
    pub fn failed(&self) -> Vec<&str> {
        self.ids_where(false)
    }

    /// True when nothing failed.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(GenerationOutcome::is_success)
    }

    fn ids_where(&self, success: bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success() == success)
            .map(|outcome| outcome.id.as_str())
            .collect()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "=".repeat(60);
        let failed = self.failed();
        writeln!(f, "{rule}")?;
        writeln!(f, "GENERATION COMPLETE")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Generated: {}/{}", self.total() - failed.len(), self.total())?;
        write!(f, "Failed: {}", failed.len())?;
        if !failed.is_empty() {
            write!(f, "\n\nFailed items: {}", failed.join(", "))?;
        }
        Ok(())
    }
}

/// Sequential batch runner. A failed item never stops the batch.
#[derive(Debug)]
pub struct Runner<S> {
    service: S,
}

impl<S: ImageService> Runner<S> {
    /// Wraps the service that does the actual generation.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Attempts every prompt in catalog order and reports what happened.
    pub async fn run(&self, catalog: &PromptCatalog) -> RunReport {
        let total = catalog.len();
        let mut report = RunReport {
            outcomes: Vec::with_capacity(total),
        };

        for (index, entry) in catalog.iter().enumerate() {
            info!("[{}/{}] processing {}", index + 1, total, entry.id);
            let status = match self.service.generate(&entry.id, &entry.text).await {
                Ok(path) => {
                    info!("Saved {}: {}", entry.id, path.display());
                    OutcomeStatus::Succeeded(path)
                }
                Err(err) => {
                    error!("Failed {} ({}): {}", entry.id, err.kind(), err);
                    OutcomeStatus::Failed(err)
                }
            };
            report.outcomes.push(GenerationOutcome {
                id: entry.id.clone(),
                status,
            });
        }

        report
    }
}
