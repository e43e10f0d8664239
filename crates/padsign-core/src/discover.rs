//! Locating the external signer executable.
//!
//! Search order: explicit override path, platform-specific install
//! locations, then a PATH lookup. On macOS the app-bundle JAR launched
//! through java is preferred over the native wrapper, which misbehaves
//! when run headless.

use std::path::{Path, PathBuf};

use crate::error::SignError;
use crate::signer::SignerCommand;

/// Locate the signer, honoring an explicit override first.
pub fn find_signer(override_path: Option<&Path>) -> Result<SignerCommand, SignError> {
    if let Some(path) = override_path {
        if !path.exists() {
            return Err(SignError::Discovery(format!(
                "configured signer path does not exist: {}",
                path.display()
            )));
        }
        return command_for_path(path);
    }

    if let Some(cmd) = platform_install() {
        return Ok(cmd);
    }

    // Generalized fallback: anything on PATH under either casing.
    for name in ["autofirma", "AutoFirma"] {
        if let Ok(path) = which::which(name) {
            tracing::info!(path = %path.display(), "found signer on PATH");
            return Ok(SignerCommand::direct(path));
        }
    }

    Err(SignError::Discovery(
        "no signer executable found; install it or pass an explicit path".to_string(),
    ))
}

/// Build the invocation for a concrete signer path. JAR files are run
/// through java, anything else directly.
fn command_for_path(path: &Path) -> Result<SignerCommand, SignError> {
    let is_jar = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
    if is_jar {
        let java = java_command().ok_or_else(|| {
            SignError::Discovery(format!(
                "signer JAR {} requires java, but none was found",
                path.display()
            ))
        })?;
        Ok(SignerCommand::java_jar(java, path))
    } else {
        Ok(SignerCommand::direct(path))
    }
}

/// The java executable: `$JAVA_HOME/bin/java` when valid, else PATH.
fn java_command() -> Option<PathBuf> {
    if let Ok(java_home) = std::env::var("JAVA_HOME") {
        let candidate = Path::new(&java_home).join("bin").join("java");
        if candidate.exists() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        if exe.exists() {
            return Some(exe);
        }
    }
    which::which("java").ok()
}

#[cfg(target_os = "macos")]
fn platform_install() -> Option<SignerCommand> {
    let home = std::env::var("HOME").unwrap_or_default();

    // Prefer the bundled JAR; the native wrapper is unreliable headless.
    if let Some(java) = java_command() {
        let jar_paths = [
            PathBuf::from("/Applications/AutoFirma.app/Contents/Resources/JAR/AutoFirma.jar"),
            Path::new(&home).join("Applications/AutoFirma.app/Contents/Resources/JAR/AutoFirma.jar"),
        ];
        for jar in &jar_paths {
            if jar.exists() {
                tracing::info!(jar = %jar.display(), "found signer JAR");
                return Some(SignerCommand::java_jar(java, jar));
            }
        }
    }

    let native_paths = [
        PathBuf::from("/Applications/AutoFirma.app/Contents/MacOS/AutoFirma"),
        Path::new(&home).join("Applications/AutoFirma.app/Contents/MacOS/AutoFirma"),
    ];
    native_paths
        .into_iter()
        .find(|p| p.exists())
        .map(SignerCommand::direct)
}

#[cfg(target_os = "windows")]
fn platform_install() -> Option<SignerCommand> {
    let program_files =
        std::env::var("ProgramFiles").unwrap_or_else(|_| "C:\\Program Files".to_string());
    let program_files_x86 = std::env::var("ProgramFiles(x86)")
        .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());

    [program_files, program_files_x86]
        .into_iter()
        .map(|base| Path::new(&base).join("AutoFirma").join("AutoFirma.exe"))
        .find(|p| p.exists())
        .map(SignerCommand::direct)
}

#[cfg(all(not(target_os = "macos"), not(target_os = "windows")))]
fn platform_install() -> Option<SignerCommand> {
    [
        "/usr/bin/autofirma",
        "/usr/local/bin/autofirma",
        "/opt/autofirma/autofirma",
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
    .map(SignerCommand::direct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_override_is_a_discovery_error() {
        let err = find_signer(Some(Path::new("/nonexistent/signer"))).unwrap_err();
        assert!(matches!(err, SignError::Discovery(_)));
    }

    #[test]
    fn test_override_binary_runs_directly() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"#!/bin/sh\n").unwrap();
        let cmd = find_signer(Some(file.path())).unwrap();
        assert_eq!(cmd.program, file.path());
        assert!(cmd.leading_args.is_empty());
    }

    #[test]
    fn test_jar_override_goes_through_java_when_available() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("Signer.jar");
        std::fs::write(&jar, b"PK").unwrap();

        match command_for_path(&jar) {
            Ok(cmd) => {
                // java was found; the JAR must be launched through it
                assert_eq!(
                    cmd.leading_args,
                    vec!["-jar".to_string(), jar.display().to_string()]
                );
            }
            Err(err) => assert!(matches!(err, SignError::Discovery(_))),
        }
    }
}
