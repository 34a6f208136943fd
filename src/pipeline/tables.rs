//! Text-aligned table detection.
//!
//! No ruling lines are needed: a table is recognised purely from how words
//! sit on their lines. A line is cut into cells wherever the horizontal gap
//! between two neighbouring words is wider than the line's cell gap, which
//! grows with the type size (a word space in 24 pt text is wider than a
//! column gutter in 8 pt text). A run of at least [`MIN_TABLE_ROWS`]
//! consecutive lines in the same block is a table when every line splits into
//! the same number of cells (two or more) and each column lines up with the
//! one above it by its left edge, right edge or centre.

use crate::engine::{EngineWord, NativeRect};

/// Smallest gap (points) that can separate two cells.
pub const MIN_CELL_GAP_PT: f64 = 5.0;

/// Cell gap as a multiple of the line's glyph height.
pub const CELL_GAP_EM: f64 = 1.0;

pub const MIN_TABLE_ROWS: usize = 2;

/// The words of one engine line.
#[derive(Debug, Clone)]
pub struct TextLine<'a> {
    pub block_no: u32,
    pub line_no: u32,
    pub words: Vec<&'a EngineWord>,
}

/// One cell of a split line.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub rect: NativeRect,
}

impl TextLine<'_> {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tallest glyph box on the line.
    pub fn height(&self) -> f64 {
        self.words
            .iter()
            .map(|w| w.rect.height())
            .fold(0.0, f64::max)
    }

    /// Horizontal gap wider than which two words fall into separate cells.
    pub fn cell_gap(&self) -> f64 {
        (self.height() * CELL_GAP_EM).max(MIN_CELL_GAP_PT)
    }

    /// Cells, split at gaps wider than [`TextLine::cell_gap`].
    pub fn cells(&self) -> Vec<Cell> {
        let gap = self.cell_gap();
        let mut cells: Vec<Cell> = Vec::new();
        let mut prev: Option<&EngineWord> = None;

        for w in &self.words {
            let split = prev.map_or(true, |p| w.rect.x0 - p.rect.x1 > gap);
            match cells.last_mut() {
                Some(cell) if !split => {
                    cell.text.push(' ');
                    cell.text.push_str(&w.text);
                    cell.rect = cell.rect.union(&w.rect);
                }
                _ => cells.push(Cell {
                    text: w.text.clone(),
                    rect: w.rect,
                }),
            }
            prev = Some(w);
        }
        cells
    }
}

/// Group a page's words (already in reading order) into lines.
pub fn lines_of(words: &[EngineWord]) -> Vec<TextLine<'_>> {
    let mut lines: Vec<TextLine<'_>> = Vec::new();
    for w in words {
        match lines.last_mut() {
            Some(line) if line.block_no == w.block_no && line.line_no == w.line_no => {
                line.words.push(w)
            }
            _ => lines.push(TextLine {
                block_no: w.block_no,
                line_no: w.line_no,
                words: vec![w],
            }),
        }
    }
    lines
}

/// A detected table: the lines it covers, its cell texts and its extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Index of the first covered line.
    pub start: usize,
    /// One past the last covered line.
    pub end: usize,
    pub rows: Vec<Vec<String>>,
    /// Union of every cell box, top-left origin.
    pub bbox: NativeRect,
}

impl Table {
    pub fn covers(&self, line: usize) -> bool {
        (self.start..self.end).contains(&line)
    }

    pub fn cols(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Render as a GFM table; the first row is the header.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|c| c.trim().replace('|', "\\|")).collect();
            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");
            if i == 0 {
                out.push('|');
                out.push_str(&vec!["---"; row.len()].join("|"));
                out.push_str("|\n");
            }
        }
        out
    }
}

/// Whether every column of `below` sits under the matching column of `above`.
fn columns_align(above: &[Cell], below: &[Cell], tolerance: f64) -> bool {
    above.iter().zip(below).all(|(a, b)| {
        let left = (a.rect.x0 - b.rect.x0).abs();
        let right = (a.rect.x1 - b.rect.x1).abs();
        let centre = ((a.rect.x0 + a.rect.x1) - (b.rect.x0 + b.rect.x1)).abs() / 2.0;
        left.min(right).min(centre) <= tolerance
    })
}

/// Find every table among `lines`.
pub fn detect_tables(lines: &[TextLine<'_>]) -> Vec<Table> {
    let cells: Vec<Vec<Cell>> = lines.iter().map(TextLine::cells).collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let width = cells[i].len();
        let mut j = i + 1;
        if width >= 2 {
            while j < lines.len()
                && lines[j].block_no == lines[i].block_no
                && cells[j].len() == width
                && columns_align(
                    &cells[j - 1],
                    &cells[j],
                    lines[j - 1].cell_gap().max(lines[j].cell_gap()),
                )
            {
                j += 1;
            }
        }
        if width >= 2 && j - i >= MIN_TABLE_ROWS {
            let bbox = cells[i..j]
                .iter()
                .flatten()
                .map(|c| c.rect)
                .reduce(|a, b| a.union(&b));
            if let Some(bbox) = bbox {
                tables.push(Table {
                    start: i,
                    end: j,
                    rows: cells[i..j]
                        .iter()
                        .map(|row| row.iter().map(|c| c.text.clone()).collect())
                        .collect(),
                    bbox,
                });
            }
            i = j;
        } else {
            i += 1;
        }
    }
    tables
}
