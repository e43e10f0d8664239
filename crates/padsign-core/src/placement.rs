//! Signature placement heuristic.
//!
//! Scans a single right-hand column of the last page from the bottom
//! margin upward and returns the first candidate rectangle that contains
//! no text anchor. The scan never climbs above 80% of the page height so
//! the stamp stays clear of headers. When every candidate is occupied the
//! bottom-most one is returned anyway with an overlap flag, and when the
//! page could not be read at all a hardcoded last-resort rectangle is used.

use crate::geometry::{PageGeometry, TextAnchor};

/// Default stamp width in PDF points.
pub const DEFAULT_WIDTH: f64 = 200.0;
/// Default stamp height in PDF points.
pub const DEFAULT_HEIGHT: f64 = 100.0;
/// Distance kept from the page edges.
pub const PAGE_MARGIN: f64 = 30.0;
/// Vertical gap between stacked candidate rectangles.
pub const STACK_PADDING: f64 = 10.0;
/// Fraction of the page height above which no candidate is considered.
pub const SEARCH_CEILING: f64 = 0.8;

/// A candidate signature rectangle, lower-left anchored, 1-based page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page: u32,
}

impl SignatureRect {
    /// Point-in-rectangle occupancy test, inclusive on all edges.
    pub fn contains(&self, anchor: &TextAnchor) -> bool {
        self.x <= anchor.x
            && anchor.x <= self.x + self.width
            && self.y <= anchor.y
            && anchor.y <= self.y + self.height
    }

    pub fn upper_right_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn upper_right_y(&self) -> f64 {
        self.y + self.height
    }
}

/// Result of the placement scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: SignatureRect,
    /// True when every candidate was occupied and the bottom-most
    /// rectangle was returned regardless.
    pub overlaps_text: bool,
}

/// Last-resort rectangle used when the document geometry could not be
/// obtained at all. Not a computed placement.
pub fn last_resort_rect() -> SignatureRect {
    SignatureRect {
        x: 300.0,
        y: 50.0,
        width: DEFAULT_WIDTH,
        height: DEFAULT_HEIGHT,
        page: 1,
    }
}

/// Fixed safe-zone rectangle for the fallback signing attempt, keeping the
/// size and page of the rejected placement.
pub fn safe_zone_rect(width: f64, height: f64, page: u32) -> SignatureRect {
    SignatureRect {
        x: 50.0,
        y: 50.0,
        width,
        height,
        page,
    }
}

/// First-fit scan of the right-hand column, bottom to top.
///
/// The column x is pinned to `page_width - width - margin`, clamped to 0
/// for pages narrower than the column. The returned page number is always
/// the last page's 1-based number.
pub fn find_placement(
    geometry: &PageGeometry,
    width: f64,
    height: f64,
    anchors: &[TextAnchor],
) -> Placement {
    let page = geometry.page_index as u32 + 1;

    let column_x = geometry.width - width - PAGE_MARGIN;
    let x = if column_x < 0.0 {
        tracing::debug!(
            page_width = geometry.width,
            "page narrower than signature column, clamping x to 0"
        );
        0.0
    } else {
        column_x
    };

    let ceiling = SEARCH_CEILING * geometry.height;
    let mut y = PAGE_MARGIN;
    while y < ceiling {
        let rect = SignatureRect {
            x,
            y,
            width,
            height,
            page,
        };
        if !anchors.iter().any(|a| rect.contains(a)) {
            return Placement {
                rect,
                overlaps_text: false,
            };
        }
        y += height + STACK_PADDING;
    }

    // Everything in the column is occupied; accept overlap at the bottom.
    Placement {
        rect: SignatureRect {
            x,
            y: PAGE_MARGIN,
            width,
            height,
            page,
        },
        overlaps_text: true,
    }
}
