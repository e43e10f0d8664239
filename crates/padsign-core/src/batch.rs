//! Batch driver.
//!
//! Processes every PDF directly inside an input directory, strictly
//! sequentially: geometry, placement, primary attempt, optional fallback,
//! then the next file. Per-file failures are isolated so one bad document
//! never stops the batch. The external signer is a heavyweight process
//! whose concurrent behavior is unverified, so nothing here is parallel.

use std::path::{Path, PathBuf};

use crate::directives::SignatureOptions;
use crate::error::SignError;
use crate::geometry::read_last_page;
use crate::placement::{find_placement, last_resort_rect, SignatureRect};
use crate::profile::SigningProfile;
use crate::retry::{sign_with_retry, truncate_diag, SigningJob};
use crate::signer::{pkcs12_store, SignExecutor};

/// Suffix appended to the input stem to form the output name. Inputs whose
/// name already carries it are skipped so a signed output is never re-fed.
pub const SIGNED_MARKER: &str = "-signed.pdf";

/// Everything one batch run needs, resolved up front by the caller.
///
/// `options.rect` is ignored; the placement is computed per file (or taken
/// from `profile` when set).
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cert_path: PathBuf,
    pub password: String,
    pub alias: Option<String>,
    pub options: SignatureOptions,
    /// Stamp size used by the placement heuristic.
    pub sig_width: f64,
    pub sig_height: f64,
    /// Fixed placement defaults resolved from a named profile, if any.
    pub profile: Option<SigningProfile>,
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Derive the output file name for an input. Same input name always maps
/// to the same output name.
pub fn output_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}{SIGNED_MARKER}")
}

/// Whether a file name already carries the signed marker.
pub fn is_already_signed(file_name: &str) -> bool {
    file_name.contains(SIGNED_MARKER)
}

/// Enumerate `*.pdf` files directly inside `dir` (non-recursive), sorted
/// by name, with already-signed files filtered out.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, SignError> {
    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_already_signed(&name) {
            tracing::debug!(file = %name, "skipping already-signed input");
            continue;
        }
        inputs.push(path);
    }
    inputs.sort();
    Ok(inputs)
}

/// Run the whole batch. Only configuration-level failures (unreadable
/// input directory, uncreatable output directory) return `Err`; per-file
/// failures are counted in the outcome.
pub fn run_batch(
    config: &BatchConfig,
    executor: &mut dyn SignExecutor,
) -> Result<BatchOutcome, SignError> {
    std::fs::create_dir_all(&config.output_dir)?;

    let inputs = collect_inputs(&config.input_dir)?;
    if inputs.is_empty() {
        tracing::warn!(dir = %config.input_dir.display(), "no PDF files found");
        return Ok(BatchOutcome::default());
    }
    tracing::info!(count = inputs.len(), "found PDF files to process");

    let mut outcome = BatchOutcome {
        total: inputs.len(),
        ..Default::default()
    };

    for input in &inputs {
        match sign_one(config, executor, input) {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                outcome.failed += 1;
                match &e {
                    SignError::Rejected {
                        exit_code, stderr, ..
                    } => {
                        tracing::error!(
                            input = %input.display(),
                            exit_code = ?exit_code,
                            stderr = %truncate_diag(stderr),
                            "both signing attempts failed"
                        );
                    }
                    other => {
                        tracing::error!(input = %input.display(), "signing failed: {other}");
                    }
                }
            }
        }
    }

    tracing::info!(
        total = outcome.total,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "signing process completed"
    );
    Ok(outcome)
}

fn sign_one(
    config: &BatchConfig,
    executor: &mut dyn SignExecutor,
    input: &Path,
) -> Result<(), SignError> {
    let output = config.output_dir.join(output_name(input));

    let mut opts = config.options.clone();
    if opts.visible {
        opts.rect = Some(place_signature(config, input));
        if let Some(profile) = &config.profile {
            if opts.text.is_none() {
                opts.text = profile.text.clone();
            }
        }
    }

    let job = SigningJob {
        input: input.to_path_buf(),
        output,
        store: pkcs12_store(&config.cert_path),
        password: config.password.clone(),
        alias: config.alias.clone(),
    };

    sign_with_retry(executor, &job, &opts)
}

/// Choose the signature rectangle for one file: profile placement when a
/// profile is configured, else the heuristic scan of the last page, else
/// the hardcoded last resort when the document cannot be read.
fn place_signature(config: &BatchConfig, input: &Path) -> SignatureRect {
    if let Some(profile) = &config.profile {
        let default_page = match read_last_page(input) {
            Ok(last) => last.geometry.page_index as u32 + 1,
            Err(e) => {
                tracing::debug!(input = %input.display(), "could not read last page: {e}");
                1
            }
        };
        return profile.rect_on(default_page);
    }

    match read_last_page(input) {
        Ok(last) => {
            let placement = find_placement(
                &last.geometry,
                config.sig_width,
                config.sig_height,
                &last.anchors,
            );
            if placement.overlaps_text {
                tracing::warn!(
                    input = %input.display(),
                    "no free region found on last page, accepting text overlap"
                );
            }
            placement.rect
        }
        Err(e) => {
            tracing::warn!(
                input = %input.display(),
                "could not read geometry ({e}), using hardcoded placement"
            );
            last_resort_rect()
        }
    }
}
