//! Two-attempt signing protocol.
//!
//! The external signer occasionally rejects a placement it dislikes, so a
//! failed visible signing is retried exactly once with a fixed safe-zone
//! rectangle. The protocol is deliberately bounded: the tool is slow to
//! start (a JVM on most platforms) and an unbounded retry would mask a
//! systemic certificate or password failure as a placement failure.

use crate::directives::{build_directives, encode_directives, SignatureOptions};
use crate::error::SignError;
use crate::placement::{safe_zone_rect, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::signer::{SignAttemptResult, SignExecutor, SignRequest};

/// States of the per-file signing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Primary,
    Fallback,
    Succeeded,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::Failed)
    }
}

/// Pure transition function for the protocol.
///
/// A failed primary attempt falls back only when a visible signature was
/// requested; invisible signings have no placement to vary, so retrying
/// would just repeat the identical invocation.
pub fn next_state(state: AttemptState, attempt_succeeded: bool, visible: bool) -> AttemptState {
    match state {
        AttemptState::Primary if attempt_succeeded => AttemptState::Succeeded,
        AttemptState::Primary if visible => AttemptState::Fallback,
        AttemptState::Primary => AttemptState::Failed,
        AttemptState::Fallback if attempt_succeeded => AttemptState::Succeeded,
        AttemptState::Fallback => AttemptState::Failed,
        terminal => terminal,
    }
}

/// Credential and path material shared by both attempts on one file.
#[derive(Debug, Clone)]
pub struct SigningJob {
    pub input: std::path::PathBuf,
    pub output: std::path::PathBuf,
    pub store: String,
    pub password: String,
    pub alias: Option<String>,
}

impl SigningJob {
    fn request_with(&self, opts: &SignatureOptions) -> SignRequest {
        SignRequest {
            input: self.input.clone(),
            output: self.output.clone(),
            store: self.store.clone(),
            password: self.password.clone(),
            alias: self.alias.clone(),
            config_b64: encode_directives(&build_directives(opts)),
        }
    }
}

/// Sign one file, retrying once in the safe zone when the primary visible
/// placement is rejected.
///
/// All non-positional metadata (location, reason, timestamp, text) is
/// preserved across the fallback. On terminal failure the most recent
/// attempt's diagnostics are returned inside [`SignError::Rejected`].
pub fn sign_with_retry(
    executor: &mut dyn SignExecutor,
    job: &SigningJob,
    opts: &SignatureOptions,
) -> Result<(), SignError> {
    let mut state = AttemptState::Primary;
    let mut current = opts.clone();

    loop {
        let request = job.request_with(&current);
        let result = executor.attempt(&request)?;

        if result.succeeded {
            tracing::info!(
                attempt = ?state,
                input = %job.input.display(),
                "signed successfully"
            );
        } else {
            tracing::warn!(
                attempt = ?state,
                input = %job.input.display(),
                exit_code = ?result.exit_code,
                output_exists = result.output_exists,
                stderr = %truncate_diag(&result.stderr),
                "signing attempt failed"
            );
        }

        match next_state(state, result.succeeded, opts.visible) {
            AttemptState::Succeeded => return Ok(()),
            AttemptState::Failed => {
                return Err(SignError::Rejected {
                    exit_code: result.exit_code,
                    stdout: result.stdout,
                    stderr: result.stderr,
                })
            }
            next => {
                if next == AttemptState::Fallback {
                    // Keep the size and page already determined, move to
                    // the safe zone.
                    let (width, height, page) = match current.rect {
                        Some(rect) => (rect.width, rect.height, rect.page),
                        None => (DEFAULT_WIDTH, DEFAULT_HEIGHT, 1),
                    };
                    current.rect = Some(safe_zone_rect(width, height, page));
                }
                state = next;
            }
        }
    }
}

/// Cap diagnostic output carried into log lines.
pub(crate) fn truncate_diag(s: &str) -> &str {
    const MAX: usize = 500;
    if s.len() <= MAX {
        return s;
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::SignatureRect;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use std::path::PathBuf;

    /// Scripted executor: pops one result per attempt, records requests.
    struct ScriptedExecutor {
        script: Vec<bool>,
        requests: Vec<SignRequest>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<bool>) -> Self {
            Self {
                script,
                requests: Vec::new(),
            }
        }
    }

    impl SignExecutor for ScriptedExecutor {
        fn attempt(&mut self, request: &SignRequest) -> Result<SignAttemptResult, SignError> {
            self.requests.push(request.clone());
            let succeeded = self.script.remove(0);
            Ok(SignAttemptResult {
                succeeded,
                exit_code: Some(if succeeded { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if succeeded {
                    String::new()
                } else {
                    "placement rejected".to_string()
                },
                output_exists: succeeded,
            })
        }
    }

    fn job() -> SigningJob {
        SigningJob {
            input: PathBuf::from("doc.pdf"),
            output: PathBuf::from("doc-signed.pdf"),
            store: "pkcs12:cert.p12".to_string(),
            password: "secret".to_string(),
            alias: Some("alias1".to_string()),
        }
    }

    fn visible_opts() -> SignatureOptions {
        SignatureOptions {
            visible: true,
            rect: Some(SignatureRect {
                x: 382.0,
                y: 30.0,
                width: 200.0,
                height: 100.0,
                page: 3,
            }),
            location: Some("Sevilla".to_string()),
            timestamp: true,
            ..Default::default()
        }
    }

    fn decoded_config(request: &SignRequest) -> String {
        let blob = request.config_b64.as_ref().expect("config expected");
        String::from_utf8(BASE64.decode(blob).unwrap()).unwrap()
    }

    #[test]
    fn test_primary_success_makes_one_attempt() {
        let mut exec = ScriptedExecutor::new(vec![true]);
        sign_with_retry(&mut exec, &job(), &visible_opts()).unwrap();
        assert_eq!(exec.requests.len(), 1);
    }

    #[test]
    fn test_visible_failure_retries_exactly_once_in_safe_zone() {
        let mut exec = ScriptedExecutor::new(vec![false, false]);
        let err = sign_with_retry(&mut exec, &job(), &visible_opts()).unwrap_err();

        assert_eq!(exec.requests.len(), 2);
        let fallback = decoded_config(&exec.requests[1]);
        assert!(fallback.contains("signaturePositionOnPageLowerLeftX=50"));
        assert!(fallback.contains("signaturePositionOnPageLowerLeftY=50"));
        // Size and page survive the fallback.
        assert!(fallback.contains("signaturePositionOnPageUpperRightX=250"));
        assert!(fallback.contains("signaturePositionOnPageUpperRightY=150"));
        assert!(fallback.contains("signaturePage=3"));
        // Non-positional metadata is preserved.
        assert!(fallback.contains("signatureProductionCity=Sevilla"));
        assert!(fallback.contains("applyTimestamp=true"));

        assert!(matches!(err, SignError::Rejected { exit_code: Some(1), .. }));
    }

    #[test]
    fn test_fallback_success_recovers_the_file() {
        let mut exec = ScriptedExecutor::new(vec![false, true]);
        sign_with_retry(&mut exec, &job(), &visible_opts()).unwrap();
        assert_eq!(exec.requests.len(), 2);
    }

    #[test]
    fn test_invisible_failure_never_retries() {
        let opts = SignatureOptions {
            visible: false,
            ..Default::default()
        };
        let mut exec = ScriptedExecutor::new(vec![false]);
        let err = sign_with_retry(&mut exec, &job(), &opts).unwrap_err();
        assert_eq!(exec.requests.len(), 1);
        assert!(matches!(err, SignError::Rejected { .. }));
        // Invisible with no metadata carries no config at all.
        assert!(exec.requests[0].config_b64.is_none());
    }

    #[test]
    fn test_invocation_error_propagates_immediately() {
        struct BrokenExecutor;
        impl SignExecutor for BrokenExecutor {
            fn attempt(&mut self, _: &SignRequest) -> Result<SignAttemptResult, SignError> {
                Err(SignError::Invocation("spawn failed".to_string()))
            }
        }
        let err = sign_with_retry(&mut BrokenExecutor, &job(), &visible_opts()).unwrap_err();
        assert!(matches!(err, SignError::Invocation(_)));
    }

    #[test]
    fn test_transition_table() {
        use AttemptState::*;
        assert_eq!(next_state(Primary, true, true), Succeeded);
        assert_eq!(next_state(Primary, false, true), Fallback);
        assert_eq!(next_state(Primary, false, false), Failed);
        assert_eq!(next_state(Fallback, true, true), Succeeded);
        assert_eq!(next_state(Fallback, false, true), Failed);
        assert_eq!(next_state(Succeeded, false, true), Succeeded);
        assert_eq!(next_state(Failed, true, true), Failed);
    }

    #[test]
    fn test_truncate_diag_respects_char_boundaries() {
        let long = "\u{e9}".repeat(400); // 800 bytes of two-byte chars
        let cut = truncate_diag(&long);
        assert!(cut.len() <= 500);
        assert!(cut.chars().all(|c| c == '\u{e9}'));
    }
}
