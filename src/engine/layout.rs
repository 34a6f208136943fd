//! Group positioned characters into words, lines and blocks.
//!
//! PDFium reports text one character at a time. The extraction contract needs
//! words carrying a `(block_no, line_no, word_no)` sequence, so this module
//! rebuilds that hierarchy from geometry:
//!
//! * a **word** ends at whitespace, or when the horizontal gap to the next
//!   glyph is wider than a fraction of the glyph height;
//! * a **line** ends at a newline character, or when the next glyph's vertical
//!   centre falls outside the current line's span;
//! * a **block** ends when the vertical gap between two lines exceeds the
//!   height of the previous line, or when text jumps back up the page
//!   (a new column).
//!
//! Everything here is pure so it can be tested without a native library.

use super::{EngineWord, NativeRect};

/// Gap (as a fraction of glyph height) that splits two glyphs into two words.
const WORD_GAP_RATIO: f64 = 0.3;

/// A single character with its box, as read from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedChar {
    pub ch: char,
    /// `None` when the engine produced the character without a box
    /// (generated spaces and line breaks).
    pub rect: Option<NativeRect>,
}

impl PositionedChar {
    pub fn new(ch: char, rect: Option<NativeRect>) -> Self {
        Self { ch, rect }
    }
}

struct Line {
    rect: NativeRect,
    words: Vec<(String, NativeRect)>,
}

#[derive(Default)]
struct Builder {
    lines: Vec<Line>,
    line: Option<Line>,
    word: Option<(String, NativeRect)>,
}

impl Builder {
    fn end_word(&mut self) {
        let Some((text, rect)) = self.word.take() else {
            return;
        };
        match self.line.as_mut() {
            Some(line) => {
                line.rect = line.rect.union(&rect);
                line.words.push((text, rect));
            }
            None => {
                self.line = Some(Line {
                    rect,
                    words: vec![(text, rect)],
                });
            }
        }
    }

    fn end_line(&mut self) {
        self.end_word();
        if let Some(line) = self.line.take() {
            self.lines.push(line);
        }
    }

    /// Whether a glyph at `rect` belongs on a new line.
    fn breaks_line(&self, rect: &NativeRect) -> bool {
        let span = match (&self.word, &self.line) {
            (Some((_, w)), Some(l)) => l.rect.union(w),
            (Some((_, w)), None) => *w,
            (None, Some(l)) => l.rect,
            (None, None) => return false,
        };
        let centre = (rect.y0 + rect.y1) / 2.0;
        centre < span.y0 || centre > span.y1
    }

    /// Whether a glyph at `rect` starts a new word on the same line.
    fn breaks_word(&self, rect: &NativeRect) -> bool {
        match &self.word {
            Some((_, w)) => {
                let gap = rect.x0 - w.x1;
                let height = rect.height().max(w.height());
                gap > height * WORD_GAP_RATIO || rect.x1 < w.x0
            }
            None => false,
        }
    }

    fn push(&mut self, ch: char, rect: NativeRect) {
        if self.breaks_line(&rect) {
            self.end_line();
        } else if self.breaks_word(&rect) {
            self.end_word();
        }
        match self.word.as_mut() {
            Some((text, r)) => {
                text.push(ch);
                *r = r.union(&rect);
            }
            None => self.word = Some((ch.to_string(), rect)),
        }
    }
}

/// Build the word list for one page.
///
/// The output is in reading order, numbered from zero at every level.
pub fn group_words(chars: impl IntoIterator<Item = PositionedChar>) -> Vec<EngineWord> {
    let mut builder = Builder::default();

    for c in chars {
        if c.ch == '\n' || c.ch == '\r' {
            builder.end_line();
            continue;
        }
        if c.ch.is_whitespace() || c.ch.is_control() {
            builder.end_word();
            continue;
        }
        match c.rect {
            Some(rect) => builder.push(c.ch, rect),
            // A glyph without a box still belongs to the word it sits in.
            None => {
                if let Some((text, _)) = builder.word.as_mut() {
                    text.push(c.ch);
                }
            }
        }
    }
    builder.end_line();

    number(builder.lines)
}

fn number(lines: Vec<Line>) -> Vec<EngineWord> {
    let mut words = Vec::new();
    let mut block_no = 0u32;
    let mut line_no = 0u32;
    let mut prev: Option<NativeRect> = None;

    for line in lines {
        if let Some(p) = prev {
            let gap = line.rect.y0 - p.y1;
            let jumped_up = line.rect.y1 < p.y0;
            if gap > p.height() || jumped_up {
                block_no += 1;
                line_no = 0;
            } else {
                line_no += 1;
            }
        }
        prev = Some(line.rect);

        for (word_no, (text, rect)) in line.words.into_iter().enumerate() {
            words.push(EngineWord {
                text,
                rect,
                block_no,
                line_no,
                word_no: word_no as u32,
            });
        }
    }
    words
}
