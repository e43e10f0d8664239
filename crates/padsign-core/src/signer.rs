//! Subprocess boundary to the external signer.
//!
//! The signer is a pre-installed external application (native binary or a
//! JAR launched through java). One invocation signs one file; success
//! requires both a zero exit code and the declared output file actually
//! existing on disk, because the tool has been observed to exit 0 without
//! producing output under some failure modes.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::SignError;

/// How to start the external signer: a program plus any fixed leading
/// arguments (e.g. `java -jar AutoFirma.jar`).
#[derive(Debug, Clone)]
pub struct SignerCommand {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl SignerCommand {
    /// A natively installed signer binary.
    pub fn direct(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// A signer JAR launched through the given java executable.
    pub fn java_jar(java: impl Into<PathBuf>, jar: &Path) -> Self {
        Self {
            program: java.into(),
            leading_args: vec!["-jar".to_string(), jar.display().to_string()],
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd
    }
}

/// One signing invocation, fully described.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Keystore descriptor, e.g. `pkcs12:/path/to/cert.p12`.
    pub store: String,
    pub password: String,
    pub alias: Option<String>,
    /// Base64-encoded directive block; omitted entirely when `None`.
    pub config_b64: Option<String>,
}

/// Outcome of a single subprocess invocation, folded into the file-level
/// result by the retry orchestrator.
#[derive(Debug, Clone)]
pub struct SignAttemptResult {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output_exists: bool,
}

/// Seam between orchestration and the real subprocess, so retry and batch
/// logic are testable without a signer installed.
pub trait SignExecutor {
    /// Run one signing attempt.
    ///
    /// A rejection (nonzero exit, missing output) is a normal `Ok` result;
    /// only invocation-level failures (spawn errors) are `Err`.
    fn attempt(&mut self, request: &SignRequest) -> Result<SignAttemptResult, SignError>;
}

/// Production executor wrapping the external signer process.
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    command: SignerCommand,
}

impl SubprocessExecutor {
    pub fn new(command: SignerCommand) -> Self {
        Self { command }
    }
}

impl SignExecutor for SubprocessExecutor {
    fn attempt(&mut self, request: &SignRequest) -> Result<SignAttemptResult, SignError> {
        let mut cmd = self.command.to_command();
        cmd.arg("sign")
            .arg("-i")
            .arg(&request.input)
            .arg("-o")
            .arg(&request.output)
            .arg("-store")
            .arg(&request.store)
            .arg("-password")
            .arg(&request.password)
            .arg("-format")
            .arg("pades");
        if let Some(alias) = &request.alias {
            cmd.arg("-alias").arg(alias);
        }
        if let Some(blob) = &request.config_b64 {
            cmd.arg("-config").arg(blob);
        }

        tracing::debug!(input = %request.input.display(), "executing signing command");
        let output = cmd.output().map_err(|e| {
            SignError::Invocation(format!("{}: {e}", self.command.program.display()))
        })?;

        let output_exists = request.output.exists();
        let exit_code = output.status.code();
        Ok(SignAttemptResult {
            succeeded: output.status.success() && output_exists,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            output_exists,
        })
    }
}

/// Build the `pkcs12:<path>` store descriptor the signer expects.
pub fn pkcs12_store(cert_path: &Path) -> String {
    format!("pkcs12:{}", cert_path.display())
}

/// Ask the signer for the aliases in a keystore and return the first one.
///
/// Runs the `listaliases` subcommand; output is one alias per line. Lines
/// are trimmed, blanks are dropped.
pub fn first_alias(
    command: &SignerCommand,
    store: &str,
    password: &str,
) -> Result<Option<String>, SignError> {
    let mut cmd = command.to_command();
    cmd.arg("listaliases")
        .arg("-store")
        .arg(store)
        .arg("-password")
        .arg(password);

    let output = cmd
        .output()
        .map_err(|e| SignError::Invocation(format!("{}: {e}", command.program.display())))?;

    if !output.status.success() {
        tracing::warn!(
            exit_code = ?output.status.code(),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "failed to list keystore aliases"
        );
        return Ok(None);
    }

    Ok(parse_alias_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_alias_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias_takes_first_non_blank_line() {
        let stdout = "\n  \nmi-certificado  \nsegundo\n";
        assert_eq!(parse_alias_output(stdout), Some("mi-certificado".to_string()));
    }

    #[test]
    fn test_parse_alias_empty_output() {
        assert_eq!(parse_alias_output(""), None);
        assert_eq!(parse_alias_output("   \n \n"), None);
    }

    #[test]
    fn test_pkcs12_store_descriptor() {
        assert_eq!(
            pkcs12_store(Path::new("/certs/firma.p12")),
            "pkcs12:/certs/firma.p12"
        );
    }

    #[test]
    fn test_java_jar_command_shape() {
        let cmd = SignerCommand::java_jar("/usr/bin/java", Path::new("/opt/signer/Signer.jar"));
        assert_eq!(cmd.program, PathBuf::from("/usr/bin/java"));
        assert_eq!(
            cmd.leading_args,
            vec!["-jar".to_string(), "/opt/signer/Signer.jar".to_string()]
        );
    }

    #[test]
    fn test_spawn_failure_is_an_invocation_error() {
        let mut exec = SubprocessExecutor::new(SignerCommand::direct(
            "/nonexistent/definitely-not-a-signer",
        ));
        let request = SignRequest {
            input: PathBuf::from("in.pdf"),
            output: PathBuf::from("out.pdf"),
            store: "pkcs12:cert.p12".to_string(),
            password: "secret".to_string(),
            alias: None,
            config_b64: None,
        };
        let err = exec.attempt(&request).unwrap_err();
        assert!(matches!(err, SignError::Invocation(_)));
    }
}
