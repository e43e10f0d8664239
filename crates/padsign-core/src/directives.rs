//! Configuration directive assembly for the external signer.
//!
//! The signer consumes a plain-text property block (`key=value` per line)
//! passed as a single base64-encoded command-line token. Key names are
//! case-sensitive and fixed by the external tool. The directive order has
//! no semantic effect on the tool but is kept deterministic for logging
//! and testing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::placement::SignatureRect;

/// Default visible-signature text. The `$$...$$` tokens are placeholder
/// substitutions expanded by the external signer, passed through opaquely.
pub const DEFAULT_LAYER2_TEXT: &str = "Firmado por $$SUBJECTCN$$ el día $$SIGNDATE=dd/MM/yyyy$$";

/// Everything that shapes one signature besides the credential material.
#[derive(Debug, Clone, Default)]
pub struct SignatureOptions {
    pub visible: bool,
    pub rect: Option<SignatureRect>,
    pub location: Option<String>,
    pub reason: Option<String>,
    pub timestamp: bool,
    /// Display text override; literal `\n` sequences become real newlines.
    pub text: Option<String>,
    pub font_color: Option<String>,
    /// Base64-encoded stamp image, already read from disk by the caller.
    pub rubric_image_b64: Option<String>,
}

/// Build the ordered directive list.
///
/// Positional directives are only emitted for a visible signature with a
/// rectangle; location, reason and timestamp are appended independently.
/// The result is empty exactly when there is nothing to configure, and the
/// caller must then skip the `-config` flag entirely.
pub fn build_directives(opts: &SignatureOptions) -> Vec<String> {
    let mut lines = Vec::new();

    if opts.visible {
        if let Some(rect) = &opts.rect {
            lines.push(format!(
                "signaturePositionOnPageLowerLeftX={}",
                fmt_coord(rect.x)
            ));
            lines.push(format!(
                "signaturePositionOnPageLowerLeftY={}",
                fmt_coord(rect.y)
            ));
            lines.push(format!(
                "signaturePositionOnPageUpperRightX={}",
                fmt_coord(rect.upper_right_x())
            ));
            lines.push(format!(
                "signaturePositionOnPageUpperRightY={}",
                fmt_coord(rect.upper_right_y())
            ));
            lines.push(format!("signaturePage={}", rect.page));
            lines.push("signatureRenderingMode=1".to_string());

            let text = opts
                .text
                .as_deref()
                .unwrap_or(DEFAULT_LAYER2_TEXT)
                .replace("\\n", "\n");
            lines.push(format!("layer2Text={text}"));

            if let Some(color) = &opts.font_color {
                lines.push(format!("layer2FontColor={color}"));
            }
            if let Some(image) = &opts.rubric_image_b64 {
                lines.push(format!("signatureRubricImage={image}"));
            }
        }
    }

    if let Some(location) = &opts.location {
        lines.push(format!("signatureProductionCity={location}"));
    }
    if let Some(reason) = &opts.reason {
        lines.push(format!("signatureReason={reason}"));
    }
    if opts.timestamp {
        lines.push("applyTimestamp=true".to_string());
    }

    lines
}

/// Join the directives and base64-encode them for the subprocess boundary.
///
/// Returns `None` for an empty list so the caller can omit the `-config`
/// argument. The encoding is a strict requirement of the external
/// interface: the signer expects the whole block as one base64 token.
pub fn encode_directives(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    Some(BASE64.encode(lines.join("\n")))
}

/// Render whole coordinates without a trailing `.0` so the property block
/// matches what the external tool documents.
fn fmt_coord(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rect(x: f64, y: f64, width: f64, height: f64, page: u32) -> SignatureRect {
        SignatureRect {
            x,
            y,
            width,
            height,
            page,
        }
    }

    #[test]
    fn test_invisible_without_metadata_is_empty() {
        let opts = SignatureOptions::default();
        assert!(build_directives(&opts).is_empty());
        assert_eq!(encode_directives(&build_directives(&opts)), None);
    }

    #[test]
    fn test_invisible_ignores_rect() {
        let opts = SignatureOptions {
            visible: false,
            rect: Some(rect(10.0, 20.0, 30.0, 40.0, 2)),
            ..Default::default()
        };
        assert!(build_directives(&opts).is_empty());
    }

    #[test]
    fn test_visible_emits_positions_page_mode_and_text() {
        let opts = SignatureOptions {
            visible: true,
            rect: Some(rect(10.0, 20.0, 30.0, 40.0, 2)),
            ..Default::default()
        };
        let lines = build_directives(&opts);
        assert_eq!(
            lines,
            vec![
                "signaturePositionOnPageLowerLeftX=10".to_string(),
                "signaturePositionOnPageLowerLeftY=20".to_string(),
                "signaturePositionOnPageUpperRightX=40".to_string(),
                "signaturePositionOnPageUpperRightY=60".to_string(),
                "signaturePage=2".to_string(),
                "signatureRenderingMode=1".to_string(),
                format!("layer2Text={DEFAULT_LAYER2_TEXT}"),
            ]
        );
    }

    #[test]
    fn test_optional_metadata_appends_in_order() {
        let opts = SignatureOptions {
            visible: false,
            location: Some("Madrid".to_string()),
            reason: Some("Aprobado".to_string()),
            timestamp: true,
            ..Default::default()
        };
        let lines = build_directives(&opts);
        assert_eq!(
            lines,
            vec![
                "signatureProductionCity=Madrid".to_string(),
                "signatureReason=Aprobado".to_string(),
                "applyTimestamp=true".to_string(),
            ]
        );
    }

    #[test]
    fn test_custom_text_expands_literal_newlines() {
        let opts = SignatureOptions {
            visible: true,
            rect: Some(rect(0.0, 0.0, 200.0, 100.0, 1)),
            text: Some("Firmado\\npor mí".to_string()),
            ..Default::default()
        };
        let lines = build_directives(&opts);
        assert!(lines.contains(&"layer2Text=Firmado\npor mí".to_string()));
    }

    #[test]
    fn test_font_color_and_rubric_image_follow_text() {
        let opts = SignatureOptions {
            visible: true,
            rect: Some(rect(0.0, 0.0, 200.0, 100.0, 1)),
            font_color: Some("black".to_string()),
            rubric_image_b64: Some("aW1n".to_string()),
            ..Default::default()
        };
        let lines = build_directives(&opts);
        let text_pos = lines.iter().position(|l| l.starts_with("layer2Text=")).unwrap();
        assert_eq!(lines[text_pos + 1], "layer2FontColor=black");
        assert_eq!(lines[text_pos + 2], "signatureRubricImage=aW1n");
    }

    #[test]
    fn test_fractional_coordinates_keep_their_fraction() {
        let opts = SignatureOptions {
            visible: true,
            rect: Some(rect(12.5, 20.0, 30.0, 40.0, 1)),
            ..Default::default()
        };
        let lines = build_directives(&opts);
        assert_eq!(lines[0], "signaturePositionOnPageLowerLeftX=12.5");
        assert_eq!(lines[2], "signaturePositionOnPageUpperRightX=42.5");
    }

    #[test]
    fn test_encoding_round_trips_the_joined_block() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        let lines = vec!["a=1".to_string(), "b=2".to_string()];
        let blob = encode_directives(&lines).unwrap();
        let decoded = BASE64.decode(blob).unwrap();
        assert_eq!(decoded, b"a=1\nb=2");
    }
}
