//! Command-line arguments and environment fallback.
//!
//! Every option can come from the command line or from a `PDF_*`
//! environment variable (usually via a `.env` file); the command line
//! wins. Required parameters are validated up front, before any file is
//! touched.

use std::path::PathBuf;

use clap::Parser;
use padsign_core::{placement, SignatureOptions};

#[derive(Parser, Debug, Default)]
#[command(name = "padsign", version, about = "Batch PDF signing through an external PAdES signer")]
pub struct Args {
    /// Input directory containing PDF files
    #[arg(short = 'i', long)]
    pub input_dir: Option<PathBuf>,

    /// Output directory for signed PDFs
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Path to the PKCS#12 certificate file
    #[arg(short = 'c', long)]
    pub cert: Option<PathBuf>,

    /// Certificate password (or PDF_CERT_PASSWORD)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Signature production city
    #[arg(short = 'l', long)]
    pub location: Option<String>,

    /// Signature reason
    #[arg(short = 'r', long)]
    pub reason: Option<String>,

    /// Render a visible signature stamp
    #[arg(short = 'v', long)]
    pub visible: bool,

    /// Request a timestamp on the signature
    #[arg(short = 't', long)]
    pub timestamp: bool,

    /// Certificate alias (auto-detected when omitted)
    #[arg(short = 'a', long)]
    pub alias: Option<String>,

    /// Visible signature text (supports signer placeholder tokens)
    #[arg(long)]
    pub text: Option<String>,

    /// Image file rendered with the visible signature
    #[arg(long)]
    pub signature_image: Option<PathBuf>,

    /// Stamp width in PDF points
    #[arg(long)]
    pub sig_width: Option<f64>,

    /// Stamp height in PDF points
    #[arg(long)]
    pub sig_height: Option<f64>,

    /// Explicit path to the signer executable or JAR
    #[arg(long)]
    pub signer: Option<PathBuf>,

    /// Named signing profile from the profiles file
    #[arg(long)]
    pub profile: Option<String>,

    /// JSON file with named signing profiles
    #[arg(long)]
    pub profiles_file: Option<PathBuf>,
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cert_path: PathBuf,
    pub password: String,
    pub alias: Option<String>,
    pub options: SignatureOptions,
    pub sig_width: f64,
    pub sig_height: f64,
    pub image_path: Option<PathBuf>,
    pub signer_path: Option<PathBuf>,
    pub profile_name: Option<String>,
    pub profiles_file: Option<PathBuf>,
}

/// Merge arguments with the environment.
///
/// `env` is injected so tests do not mutate process state. On failure the
/// returned list holds one human-readable line per problem.
pub fn resolve(args: &Args, env: &dyn Fn(&str) -> Option<String>) -> Result<Resolved, Vec<String>> {
    let mut problems = Vec::new();

    let input_dir = args
        .input_dir
        .clone()
        .or_else(|| env("PDF_INPUT_DIR").map(PathBuf::from));
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| env("PDF_OUTPUT_DIR").map(PathBuf::from));
    let cert_path = args
        .cert
        .clone()
        .or_else(|| env("PDF_CERT_PATH").map(PathBuf::from));
    let password = args.password.clone().or_else(|| env("PDF_CERT_PASSWORD"));

    if input_dir.is_none() {
        problems.push("Input Directory (-i / PDF_INPUT_DIR)".to_string());
    }
    if output_dir.is_none() {
        problems.push("Output Directory (-o / PDF_OUTPUT_DIR)".to_string());
    }
    if cert_path.is_none() {
        problems.push("Certificate Path (-c / PDF_CERT_PATH)".to_string());
    }
    if password.is_none() {
        problems.push("Password (-p / PDF_CERT_PASSWORD)".to_string());
    }

    let sig_width = dimension(
        args.sig_width,
        env("PDF_SIG_WIDTH"),
        "--sig-width",
        "PDF_SIG_WIDTH",
        placement::DEFAULT_WIDTH,
    )
    .unwrap_or_else(|e| {
        problems.push(e);
        placement::DEFAULT_WIDTH
    });
    let sig_height = dimension(
        args.sig_height,
        env("PDF_SIG_HEIGHT"),
        "--sig-height",
        "PDF_SIG_HEIGHT",
        placement::DEFAULT_HEIGHT,
    )
    .unwrap_or_else(|e| {
        problems.push(e);
        placement::DEFAULT_HEIGHT
    });

    match (input_dir, output_dir, cert_path, password) {
        (Some(input_dir), Some(output_dir), Some(cert_path), Some(password))
            if problems.is_empty() =>
        {
            let visible = args.visible || env_flag(env, "PDF_VISIBLE");
            let options = SignatureOptions {
                visible,
                rect: None, // computed per file by the batch driver
                location: args.location.clone().or_else(|| env("PDF_LOCATION")),
                reason: args.reason.clone().or_else(|| env("PDF_REASON")),
                timestamp: args.timestamp || env_flag(env, "PDF_TIMESTAMP"),
                text: args.text.clone().or_else(|| env("PDF_SIG_TEXT")),
                font_color: Some(env("PDF_SIG_COLOR").unwrap_or_else(|| "black".to_string())),
                rubric_image_b64: None, // image read and encoded later
            };

            Ok(Resolved {
                input_dir,
                output_dir,
                cert_path,
                password,
                alias: args.alias.clone().or_else(|| env("PDF_ALIAS")),
                options,
                sig_width,
                sig_height,
                image_path: args
                    .signature_image
                    .clone()
                    .or_else(|| env("PDF_SIG_IMAGE_PATH").map(PathBuf::from)),
                signer_path: args
                    .signer
                    .clone()
                    .or_else(|| env("PDF_SIGNER_PATH").map(PathBuf::from)),
                profile_name: args.profile.clone().or_else(|| env("PDF_PROFILE")),
                profiles_file: args
                    .profiles_file
                    .clone()
                    .or_else(|| env("PDF_PROFILES_FILE").map(PathBuf::from)),
            })
        }
        _ => Err(problems),
    }
}

fn env_flag(env: &dyn Fn(&str) -> Option<String>, key: &str) -> bool {
    env(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// A stamp dimension must parse and be strictly positive; zero or
/// negative sizes would produce an inverted rectangle downstream.
fn dimension(
    arg: Option<f64>,
    env_value: Option<String>,
    flag: &str,
    var: &str,
    default: f64,
) -> Result<f64, String> {
    let value = match arg {
        Some(value) => value,
        None => match env_value {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| format!("{var} is not a number: {raw}"))?,
            None => default,
        },
    };
    if value <= 0.0 || value.is_nan() {
        return Err(format!("{flag} / {var} must be positive, got {value}"));
    }
    Ok(value)
}
