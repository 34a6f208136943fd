//! Geometry normalization: engine-native word boxes to the dual-coordinate
//! output shape.
//!
//! The normalized box is computed first (native ÷ page size, clamped to the
//! page) and the absolute box is derived from it (normalized × page size), so
//! `absolute == normalized × dimensions` holds exactly for every word.

use crate::engine::{EnginePage, EngineWord, NativeRect};
use crate::output::{BoundingBox, PageDimensions, WordBoundingBox};

fn ratio(value: f64, extent: f64) -> f64 {
    if extent > 0.0 && value.is_finite() {
        (value / extent).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Normalize a native rectangle against the page size.
pub fn normalize_rect(rect: &NativeRect, dims: PageDimensions) -> BoundingBox {
    let (x0, x1) = (
        ratio(rect.x0, dims.width),
        ratio(rect.x1, dims.width),
    );
    let (y0, y1) = (
        ratio(rect.y0, dims.height),
        ratio(rect.y1, dims.height),
    );
    BoundingBox {
        x0: x0.min(x1),
        y0: y0.min(y1),
        x1: x0.max(x1),
        y1: y0.max(y1),
    }
}

/// Scale a normalized box back to page units.
pub fn absolute_rect(norm: &BoundingBox, dims: PageDimensions) -> BoundingBox {
    BoundingBox {
        x0: norm.x0 * dims.width,
        y0: norm.y0 * dims.height,
        x1: norm.x1 * dims.width,
        y1: norm.y1 * dims.height,
    }
}

/// Convert one word. `page` is 1-based.
pub fn word_box(word: &EngineWord, page: usize, dims: PageDimensions) -> WordBoundingBox {
    let bbox = normalize_rect(&word.rect, dims);
    WordBoundingBox {
        page,
        text: word.text.clone(),
        bbox,
        absolute_bbox: absolute_rect(&bbox, dims),
        page_dimensions: dims,
        block_no: word.block_no,
        line_no: word.line_no,
        word_no: word.word_no,
    }
}

/// Convert every word on a page, keeping the engine's order.
pub fn page_words(page: &EnginePage) -> Vec<WordBoundingBox> {
    let dims = PageDimensions {
        width: page.width,
        height: page.height,
    };
    page.words
        .iter()
        .map(|w| word_box(w, page.index + 1, dims))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageDimensions = PageDimensions {
        width: 612.0,
        height: 792.0,
    };

    fn word(x0: f64, y0: f64, x1: f64, y1: f64) -> EngineWord {
        EngineWord {
            text: "w".into(),
            rect: NativeRect { x0, y0, x1, y1 },
            block_no: 1,
            line_no: 2,
            word_no: 3,
        }
    }

    #[test]
    fn absolute_is_normalized_times_dimensions() {
        let w = word_box(&word(72.0, 100.0, 120.5, 112.25), 1, LETTER);
        assert_eq!(w.absolute_bbox.x0, w.bbox.x0 * LETTER.width);
        assert_eq!(w.absolute_bbox.y0, w.bbox.y0 * LETTER.height);
        assert_eq!(w.absolute_bbox.x1, w.bbox.x1 * LETTER.width);
        assert_eq!(w.absolute_bbox.y1, w.bbox.y1 * LETTER.height);
        assert!((w.absolute_bbox.x0 - 72.0).abs() < 1e-9);
        assert!((w.bbox.x0 - 72.0 / 612.0).abs() < 1e-12);
    }

    #[test]
    fn indices_pass_through() {
        let w = word_box(&word(0.0, 0.0, 1.0, 1.0), 4, LETTER);
        assert_eq!((w.page, w.block_no, w.line_no, w.word_no), (4, 1, 2, 3));
    }

    #[test]
    fn boxes_are_ordered_and_clamped() {
        // Inverted and partly off-page.
        let w = word_box(&word(700.0, 50.0, 600.0, -5.0), 1, LETTER);
        assert!(w.bbox.x0 <= w.bbox.x1 && w.bbox.y0 <= w.bbox.y1);
        assert!(w.absolute_bbox.x0 <= w.absolute_bbox.x1);
        assert_eq!(w.bbox.x1, 1.0);
        assert_eq!(w.bbox.y0, 0.0);
    }

    #[test]
    fn degenerate_page_gives_zero_boxes() {
        let dims = PageDimensions {
            width: 0.0,
            height: 0.0,
        };
        let w = word_box(&word(1.0, 1.0, 2.0, 2.0), 1, dims);
        assert_eq!(w.bbox.x1, 0.0);
        assert_eq!(w.absolute_bbox.y1, 0.0);
    }

    #[test]
    fn page_numbers_are_one_based() {
        let page = EnginePage {
            index: 0,
            width: 612.0,
            height: 792.0,
            words: vec![word(1.0, 1.0, 2.0, 2.0)],
        };
        assert_eq!(page_words(&page)[0].page, 1);
    }
}
