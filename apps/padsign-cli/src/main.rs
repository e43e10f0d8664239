//! Batch PDF signing CLI.
//!
//! Resolves configuration from flags and `PDF_*` environment variables,
//! locates the external signer, auto-detects the certificate alias when
//! none is given, and runs the sequential batch driver.
//!
//! Exit status: 0 when every input signed (or the input directory held no
//! PDFs, with a warning), 1 on any per-file failure, missing
//! configuration, or when no signer executable is found.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use tracing::{error, info, warn};

use padsign_core::{
    find_signer, first_alias, load_profiles, pkcs12_store, profile, run_batch, BatchConfig,
    BatchOutcome, SigningProfile, SubprocessExecutor,
};

mod config;

use config::{Args, Resolved};

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let code = match run(&args) {
        Ok(outcome) => {
            if outcome.all_succeeded() {
                0
            } else {
                1
            }
        }
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(args: &Args) -> Result<BatchOutcome> {
    let env = |key: &str| std::env::var(key).ok();
    let mut resolved = match config::resolve(args, &env) {
        Ok(resolved) => resolved,
        Err(problems) => {
            error!("Missing or invalid configuration parameters:");
            for problem in &problems {
                error!("  - {problem}");
            }
            return Err(anyhow!(
                "provide the parameters via command line or .env file"
            ));
        }
    };

    if !resolved.input_dir.is_dir() {
        return Err(anyhow!(
            "input directory does not exist: {}",
            resolved.input_dir.display()
        ));
    }
    if !resolved.cert_path.exists() {
        return Err(anyhow!(
            "certificate file does not exist: {}",
            resolved.cert_path.display()
        ));
    }

    let signer = find_signer(resolved.signer_path.as_deref())?;
    info!(signer = %signer.program.display(), "using external signer");

    if let Some(image_path) = &resolved.image_path {
        match std::fs::read(image_path) {
            Ok(bytes) => resolved.options.rubric_image_b64 = Some(BASE64.encode(bytes)),
            Err(e) => warn!(
                image = %image_path.display(),
                "could not read signature image, continuing without it: {e}"
            ),
        }
    }

    let profile = resolve_profile(&resolved)?;

    let alias = match resolved.alias.clone() {
        Some(alias) => Some(alias),
        None => {
            info!("no alias provided, attempting auto-detection");
            let store = pkcs12_store(&resolved.cert_path);
            match first_alias(&signer, &store, &resolved.password)? {
                Some(alias) => {
                    info!(alias = %alias, "using auto-detected alias");
                    Some(alias)
                }
                None => {
                    warn!("could not detect alias, signing may fail");
                    None
                }
            }
        }
    };

    let batch = BatchConfig {
        input_dir: resolved.input_dir.clone(),
        output_dir: resolved.output_dir.clone(),
        cert_path: resolved.cert_path.clone(),
        password: resolved.password.clone(),
        alias,
        options: resolved.options.clone(),
        sig_width: resolved.sig_width,
        sig_height: resolved.sig_height,
        profile,
    };

    let mut executor = SubprocessExecutor::new(signer);
    run_batch(&batch, &mut executor).context("batch run failed")
}

/// Resolve the named profile once, before the batch loop. An unknown name
/// degrades to the built-in heuristic; a missing or malformed profiles
/// file with a requested profile is a hard configuration error.
fn resolve_profile(resolved: &Resolved) -> Result<Option<SigningProfile>> {
    let Some(name) = &resolved.profile_name else {
        return Ok(None);
    };
    let Some(file) = &resolved.profiles_file else {
        return Err(anyhow!(
            "profile '{name}' requested but no profiles file given (--profiles-file / PDF_PROFILES_FILE)"
        ));
    };
    let profiles = load_profiles(file)?;
    Ok(profile::resolve(&profiles, name).cloned())
}
