//! Named signing profiles.
//!
//! A profiles file is a JSON object mapping profile names to a rectangle
//! and optional display text. Profiles are resolved once before the batch
//! loop; a missing name falls back to the built-in heuristic placement
//! with a logged warning, never an error.
//!
//! ```json
//! {
//!   "factura": { "x": 350, "y": 40, "width": 180, "height": 80, "text": "Conforme" },
//!   "contrato": { "x": 50, "y": 50, "width": 200, "height": 100, "page": 1 }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::SignError;
use crate::placement::SignatureRect;

/// Externally supplied placement defaults for one profile name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SigningProfile {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// 1-based target page; when absent the document's last page is used.
    #[serde(default)]
    pub page: Option<u32>,
    /// Display text override for this profile.
    #[serde(default)]
    pub text: Option<String>,
}

impl SigningProfile {
    /// Materialize the profile as a rectangle on the given page, used when
    /// the profile itself does not pin one.
    pub fn rect_on(&self, default_page: u32) -> SignatureRect {
        SignatureRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            page: self.page.unwrap_or(default_page),
        }
    }
}

/// Parse a profiles file. A malformed file is a configuration error and
/// aborts the run before any document is touched.
pub fn load_profiles(path: &Path) -> Result<HashMap<String, SigningProfile>, SignError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| SignError::Configuration(format!("profiles file {}: {e}", path.display())))?;
    serde_json::from_str(&data)
        .map_err(|e| SignError::Configuration(format!("profiles file {}: {e}", path.display())))
}

/// Look up a profile by name, logging the fallback on a miss.
pub fn resolve<'a>(
    profiles: &'a HashMap<String, SigningProfile>,
    name: &str,
) -> Option<&'a SigningProfile> {
    let found = profiles.get(name);
    if found.is_none() {
        tracing::warn!(profile = name, "unknown signing profile, using built-in defaults");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_profiles(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_resolve_profile() {
        let file = write_profiles(
            r#"{"factura": {"x": 350, "y": 40, "width": 180, "height": 80, "text": "Conforme"}}"#,
        );
        let profiles = load_profiles(file.path()).unwrap();
        let profile = resolve(&profiles, "factura").unwrap();
        assert_eq!(profile.text.as_deref(), Some("Conforme"));
        assert_eq!(
            profile.rect_on(7),
            SignatureRect {
                x: 350.0,
                y: 40.0,
                width: 180.0,
                height: 80.0,
                page: 7,
            }
        );
    }

    #[test]
    fn test_profile_page_pins_the_rect() {
        let file = write_profiles(r#"{"p": {"x": 1, "y": 2, "width": 3, "height": 4, "page": 2}}"#);
        let profiles = load_profiles(file.path()).unwrap();
        let profile = resolve(&profiles, "p").unwrap();
        assert_eq!(profile.rect_on(9).page, 2);
    }

    #[test]
    fn test_missing_name_resolves_to_none() {
        let file = write_profiles(r#"{}"#);
        let profiles = load_profiles(file.path()).unwrap();
        assert!(resolve(&profiles, "nope").is_none());
    }

    #[test]
    fn test_malformed_file_is_a_configuration_error() {
        let file = write_profiles("not json");
        let err = load_profiles(file.path()).unwrap_err();
        assert!(matches!(err, SignError::Configuration(_)));
    }

    #[test]
    fn test_missing_file_is_a_configuration_error() {
        let err = load_profiles(Path::new("/nonexistent/profiles.json")).unwrap_err();
        assert!(matches!(err, SignError::Configuration(_)));
    }
}
