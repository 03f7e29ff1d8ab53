/*!
 * Auto-fitting of translated text into the box of its source block.
 *
 * Candidate sizes go from the original size down to the floor in fixed
 * steps; at each size the text is word-wrapped to the box width and
 * accepted when the wrapped lines fit the box height. When nothing fits at
 * the floor, the wrapped text is cut to the lines that fit and the last one
 * ends with the overflow marker.
 *
 * Wrapping is tried at every candidate size, not only once the floor is
 * reached. A box tall enough for two lines therefore gets two lines at the
 * original size rather than one line at a much smaller size.
 */

use crate::app_config::LayoutConfig;
use crate::fonts::RenderFont;

/// Slack allowed when comparing measured extents with box extents
const EPSILON: f32 = 0.01;

/// Outcome of fitting one block
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub font_size: f32,
    pub lines: Vec<String>,
    pub truncated: bool,
}

/// Fitting parameters bound to a rendering font
#[derive(Debug, Clone)]
pub struct TextFitter {
    font: RenderFont,
    font_step: f32,
    min_font_size: f32,
    min_font_scale: f32,
    line_spacing: f32,
    overflow_marker: String,
}

impl TextFitter {
    pub fn new(font: RenderFont, config: &LayoutConfig) -> Self {
        Self {
            font,
            font_step: config.font_step.max(0.1),
            min_font_size: config.min_font_size,
            min_font_scale: config.min_font_scale,
            line_spacing: config.line_spacing.max(1.0),
            overflow_marker: config.overflow_marker.clone(),
        }
    }

    pub fn font(&self) -> &RenderFont {
        &self.font
    }

    pub fn line_spacing(&self) -> f32 {
        self.line_spacing
    }

    pub fn overflow_marker(&self) -> &str {
        &self.overflow_marker
    }

    /// Smallest size text of `original` size may shrink to; never above `original`
    pub fn floor(&self, original: f32) -> f32 {
        self.min_font_size.max(original * self.min_font_scale).min(original)
    }

    /// Height taken by `lines` lines at `size`
    pub fn block_height(&self, lines: usize, size: f32) -> f32 {
        if lines == 0 {
            0.0
        } else {
            size + (lines - 1) as f32 * size * self.line_spacing
        }
    }

    fn max_lines(&self, height: f32, size: f32) -> usize {
        if height + EPSILON < size {
            return 1;
        }
        1 + ((height - size + EPSILON) / (size * self.line_spacing)).floor() as usize
    }

    pub fn fit(&self, text: &str, width: f32, height: f32, original_size: f32) -> FitResult {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return FitResult {
                font_size: original_size,
                lines: Vec::new(),
                truncated: false,
            };
        }

        let floor = self.floor(original_size);
        let mut size = original_size;
        loop {
            let lines = self.wrap(&words, width, size);
            if self.block_height(lines.len(), size) <= height + EPSILON
                && lines.iter().all(|l| self.font.text_width(l, size) <= width + EPSILON)
            {
                return FitResult {
                    font_size: size,
                    lines,
                    truncated: false,
                };
            }
            if size <= floor {
                return self.truncate(lines, width, height, floor);
            }
            size = (size - self.font_step).max(floor);
        }
    }

    /// Greedy word wrap; words wider than the box are split by character
    fn wrap(&self, words: &[&str], width: f32, size: f32) -> Vec<String> {
        let space = self.font.text_width(" ", size);
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in words {
            let word_width = self.font.text_width(word, size);
            if current.is_empty() {
                if word_width <= width + EPSILON {
                    current.push_str(word);
                    current_width = word_width;
                } else {
                    let mut pieces = self.split_word(word, width, size);
                    if let Some(last) = pieces.pop() {
                        lines.extend(pieces);
                        current_width = self.font.text_width(&last, size);
                        current = last;
                    }
                }
            } else if current_width + space + word_width <= width + EPSILON {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
            } else {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
                if word_width <= width + EPSILON {
                    current.push_str(word);
                    current_width = word_width;
                } else {
                    let mut pieces = self.split_word(word, width, size);
                    if let Some(last) = pieces.pop() {
                        lines.extend(pieces);
                        current_width = self.font.text_width(&last, size);
                        current = last;
                    }
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    fn split_word(&self, word: &str, width: f32, size: f32) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut piece = String::new();
        let mut piece_width = 0.0;
        for ch in word.chars() {
            let w = self.font.char_width(ch) * size / 1000.0;
            if !piece.is_empty() && piece_width + w > width + EPSILON {
                pieces.push(std::mem::take(&mut piece));
                piece_width = 0.0;
            }
            piece.push(ch);
            piece_width += w;
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
        pieces
    }

    fn truncate(&self, mut lines: Vec<String>, width: f32, height: f32, size: f32) -> FitResult {
        let keep = self.max_lines(height, size).min(lines.len()).max(1);
        lines.truncate(keep);

        let marker_width = self.font.text_width(&self.overflow_marker, size);
        if let Some(last) = lines.last_mut() {
            while !last.is_empty() && self.font.text_width(last, size) + marker_width > width + EPSILON {
                last.pop();
            }
            let trimmed_len = last.trim_end().len();
            last.truncate(trimmed_len);
            last.push_str(&self.overflow_marker);
        }

        FitResult {
            font_size: size,
            lines,
            truncated: true,
        }
    }
}
