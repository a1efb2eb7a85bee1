use crate::classifier::{ConfidencePolicy, ModelHandle};
use crate::image_loader::ImageLoader;
use crate::prefilter::{self, FilterVerdict};
use crate::session::SessionState;
use chrono::Utc;
use log::{debug, error, info, warn};
use shared::{FileOutcome, FileResult};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub debug: bool,
    pub bypass_validation: bool,
    /// Names of the files to process. `None` processes the whole batch.
    pub selected: Option<Vec<String>>,
}

impl BatchOptions {
    fn is_selected(&self, name: &str) -> bool {
        self.selected
            .as_ref()
            .is_none_or(|selected| selected.iter().any(|s| s == name))
    }
}

/// Everything one upload batch needs besides the session it writes to.
pub struct BatchContext<'a> {
    pub model: &'a ModelHandle,
    pub loader: &'a ImageLoader,
    pub policy: &'a ConfidencePolicy,
}

/// Processes an upload batch file by file, in upload order.
///
/// A non-empty batch replaces the session history. A failure on one file is reported
/// in its result and never stops the rest of the batch.
pub fn process_batch(
    session: &mut SessionState,
    ctx: &BatchContext<'_>,
    files: Vec<UploadedFile>,
    options: &BatchOptions,
) -> Vec<FileResult> {
    if files.is_empty() {
        return Vec::new();
    }
    session.reset();

    let results: Vec<FileResult> = files
        .into_iter()
        .map(|file| process_file(session, ctx, file, options))
        .collect();

    let recorded = session.records().len();
    info!(
        "Processed batch of {} files, {} predictions recorded",
        results.len(),
        recorded
    );
    results
}

fn process_file(
    session: &mut SessionState,
    ctx: &BatchContext<'_>,
    file: UploadedFile,
    options: &BatchOptions,
) -> FileResult {
    let mut result = FileResult {
        file_name: file.name.clone(),
        outcome: FileOutcome::Skipped,
        diagnostics: None,
    };
    if !options.is_selected(&file.name) {
        return result;
    }

    let image = match ctx.loader.load(&file.name, &file.bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!("Could not read {}: {}", file.name, e);
            result.outcome = FileOutcome::Unreadable {
                error: e.to_string(),
            };
            return result;
        }
    };

    if options.debug {
        let diagnostics = prefilter::diagnose(&image);
        debug!("Filter statistics for {}: {:?}", file.name, diagnostics);
        result.diagnostics = Some(diagnostics.to_map());
    }

    if !options.bypass_validation {
        if let FilterVerdict::Rejected(rejection) = prefilter::evaluate(&image) {
            warn!(
                "Rejected {}: {} ({})",
                file.name, rejection.reason, rejection.detail
            );
            result.outcome = FileOutcome::Rejected {
                reason: rejection.reason,
                detail: options.debug.then_some(rejection.detail),
            };
            return result;
        }
    }

    result.outcome = match ctx.model.classify(&image) {
        Ok(classification) => {
            debug!(
                "{} scored {:?} -> {} ({:.2}%)",
                file.name,
                classification.probabilities,
                classification.label,
                classification.confidence
            );
            if ctx.policy.is_conclusive(classification.confidence) {
                session.record(classification.label, classification.confidence, Utc::now());
                FileOutcome::Classified {
                    label: classification.label,
                    confidence: classification.confidence,
                }
            } else {
                warn!(
                    "Inconclusive result for {}: {:.2}% <= {}%",
                    file.name, classification.confidence, ctx.policy.threshold
                );
                FileOutcome::Inconclusive {
                    label: classification.label,
                    confidence: classification.confidence,
                }
            }
        }
        Err(e) => {
            error!("Model inference error for {}: {}", file.name, e);
            FileOutcome::Failed {
                error: e.to_string(),
            }
        }
    };
    result
}
