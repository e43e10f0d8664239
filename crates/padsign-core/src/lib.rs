//! Batch PDF signing through an external signer.
//!
//! This crate drives a pre-installed, AutoFirma-compatible signing
//! application over a subprocess boundary:
//!
//! - `geometry`: last-page dimensions and text anchor extraction (lopdf)
//! - `placement`: heuristic choice of a non-overlapping stamp rectangle
//! - `directives`: the signer's `key=value` configuration block
//! - `signer`: subprocess invocation and alias listing
//! - `retry`: the bounded primary/safe-zone two-attempt protocol
//! - `profile`: named placement bundles from a JSON file
//! - `discover`: locating the signer executable per platform
//! - `batch`: the sequential per-directory driver
//!
//! The signer's own cryptography (PKCS#12, PAdES, timestamping) stays on
//! the other side of the subprocess boundary.

pub mod batch;
pub mod directives;
pub mod discover;
pub mod error;
pub mod geometry;
pub mod placement;
pub mod profile;
pub mod retry;
pub mod signer;

pub use batch::{run_batch, BatchConfig, BatchOutcome};
pub use directives::{build_directives, encode_directives, SignatureOptions};
pub use discover::find_signer;
pub use error::SignError;
pub use geometry::{read_last_page, LastPage, PageGeometry, TextAnchor};
pub use placement::{find_placement, Placement, SignatureRect};
pub use profile::{load_profiles, SigningProfile};
pub use retry::{sign_with_retry, AttemptState, SigningJob};
pub use signer::{
    first_alias, pkcs12_store, SignAttemptResult, SignExecutor, SignRequest, SignerCommand,
    SubprocessExecutor,
};
