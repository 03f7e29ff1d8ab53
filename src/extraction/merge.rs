/*!
 * Grouping of raw runs into lines and of lines into logical text blocks.
 *
 * Runs here are already in top-left page space: `top` is the distance from
 * the top edge of the page to the top of the run.
 */

use crate::document::{BoundingBox, Color, TextBlock};

/// A run placed in top-left page coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRun {
    pub x0: f32,
    pub x1: f32,
    pub baseline: f32,
    pub size: f32,
    pub family: String,
    pub color: Color,
    pub text: String,
}

/// Thresholds for merging, as fractions of the font size
#[derive(Debug, Clone, Copy)]
pub struct MergeThresholds {
    /// Largest horizontal gap between runs of one line
    pub word_gap: f32,
    /// Largest vertical gap between consecutive lines of one block
    pub line_gap: f32,
}

/// Height of a text line relative to its font size; the baseline sits at 0.8 of it
const ASCENT: f32 = 0.8;
const SIZE_TOLERANCE: f32 = 0.5;
const BASELINE_TOLERANCE: f32 = 0.3;

#[derive(Debug, Clone)]
struct Line {
    bbox: BoundingBox,
    size: f32,
    family: String,
    color: Color,
    text: String,
}

impl Line {
    fn from_run(run: PlacedRun) -> Self {
        Self {
            bbox: BoundingBox::new(run.x0, run.baseline - ASCENT * run.size, run.x1 - run.x0, run.size),
            size: run.size,
            family: run.family,
            color: run.color,
            text: run.text,
        }
    }

    fn baseline(&self) -> f32 {
        self.bbox.y + ASCENT * self.size
    }

    fn accepts(&self, run: &PlacedRun, thresholds: MergeThresholds) -> bool {
        let gap = run.x0 - self.bbox.right();
        (run.baseline - self.baseline()).abs() <= BASELINE_TOLERANCE * self.size
            && (run.size - self.size).abs() <= SIZE_TOLERANCE
            && run.color.approx_eq(&self.color)
            && gap >= -0.5 * self.size
            && gap <= thresholds.word_gap * self.size
    }

    fn append(&mut self, run: PlacedRun) {
        let gap = run.x0 - self.bbox.right();
        let needs_space = gap > 0.15 * self.size
            && !self.text.ends_with(char::is_whitespace)
            && !run.text.starts_with(char::is_whitespace);
        if needs_space {
            self.text.push(' ');
        }
        self.text.push_str(&run.text);
        let run_box = BoundingBox::new(run.x0, run.baseline - ASCENT * run.size, run.x1 - run.x0, run.size);
        self.bbox = self.bbox.union(&run_box);
    }
}

#[derive(Debug, Clone)]
struct Block {
    bbox: BoundingBox,
    size: f32,
    family: String,
    color: Color,
    text: String,
    last_line_bottom: f32,
}

impl Block {
    fn from_line(line: Line) -> Self {
        Self {
            last_line_bottom: line.bbox.bottom(),
            bbox: line.bbox,
            size: line.size,
            family: line.family,
            color: line.color,
            text: line.text.trim().to_string(),
        }
    }

    fn accepts(&self, line: &Line, thresholds: MergeThresholds) -> bool {
        let gap = line.bbox.y - self.last_line_bottom;
        line.family == self.family
            && (line.size - self.size).abs() <= SIZE_TOLERANCE
            && line.color.approx_eq(&self.color)
            && self.bbox.horizontal_overlap(&line.bbox) > 0.0
            && gap >= -0.5 * self.size
            && gap <= thresholds.line_gap * self.size
    }

    fn append(&mut self, line: Line) {
        let next = line.text.trim();
        let hyphenated = self.text.ends_with('-')
            && self.text.chars().rev().nth(1).is_some_and(char::is_alphabetic)
            && next.chars().next().is_some_and(char::is_lowercase);
        if hyphenated {
            self.text.pop();
        } else if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(next);
        self.last_line_bottom = line.bbox.bottom();
        self.bbox = self.bbox.union(&line.bbox);
    }
}

/// Join runs into lines, then lines into blocks
///
/// Returned blocks carry page index 0 and reading order 0; the caller fills both.
pub fn merge_runs(mut runs: Vec<PlacedRun>, thresholds: MergeThresholds) -> Vec<TextBlock> {
    runs.sort_by(|a, b| a.baseline.total_cmp(&b.baseline).then_with(|| a.x0.total_cmp(&b.x0)));

    let mut lines: Vec<Line> = Vec::new();
    for run in runs {
        match lines.iter_mut().rev().take(8).find(|line| line.accepts(&run, thresholds)) {
            Some(line) => line.append(run),
            None => lines.push(Line::from_run(run)),
        }
    }

    lines.sort_by(|a, b| a.bbox.y.total_cmp(&b.bbox.y).then_with(|| a.bbox.x.total_cmp(&b.bbox.x)));
    let mut blocks: Vec<Block> = Vec::new();
    for line in lines {
        if line.text.trim().is_empty() {
            continue;
        }
        match blocks.iter_mut().rev().find(|block| block.accepts(&line, thresholds)) {
            Some(block) => block.append(line),
            None => blocks.push(Block::from_line(line)),
        }
    }

    blocks
        .into_iter()
        .map(|block| TextBlock {
            page_index: 0,
            bbox: block.bbox,
            reading_order: 0,
            font_family: block.family,
            font_size: block.size,
            color: block.color,
            text: block.text,
        })
        .collect()
}
