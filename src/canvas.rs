//! A sparse 2-D grid of styled glyphs (`spec.md` §4.2). [`crate::pretty`]
//! paints expression text onto it; the failure diagrammer
//! ([`crate::listeners::diagram`]) lays sub-expression values and connector
//! lines onto it. Printing walks the grid and only re-emits a colour change
//! just before the next visible glyph, so unchanged runs stay dense.

use crate::terminal::Terminal;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Style {
    pub color: Option<Color>,
    pub bold: bool,
    pub dim: bool,
}

impl Style {
    pub fn fg(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn dim(mut self) -> Self {
        self.dim = true;
        self
    }
}

/// Style plus the "important" flag that protects a cell from being
/// overwritten by later, lower-priority draws (used so that connector lines
/// never clobber value text, and `find_free_space` can tell occupied cells
/// apart from blank canvas).
#[derive(Clone, Copy, Debug, Default)]
pub struct DrawInfo {
    pub style: Style,
    pub important: bool,
}

impl DrawInfo {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn styled(style: Style) -> Self {
        Self {
            style,
            important: false,
        }
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct Cell {
    glyph: char,
    style: Style,
    important: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            glyph: ' ',
            style: Style::default(),
            important: false,
        }
    }
}

#[derive(Default)]
pub struct Canvas {
    lines: Vec<Vec<Cell>>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn ensure_lines(&mut self, n: usize) {
        if self.lines.len() < n {
            self.lines.resize_with(n, Vec::new);
        }
    }

    pub fn ensure_line_width(&mut self, line: usize, n: usize) {
        self.ensure_lines(line + 1);
        let row = &mut self.lines[line];
        if row.len() < n {
            row.resize_with(n, Cell::default);
        }
    }

    pub fn insert_line_before(&mut self, n: usize) {
        self.ensure_lines(n);
        self.lines.insert(n, Vec::new());
    }

    pub fn draw_string(&mut self, line: usize, col: usize, text: &str, info: DrawInfo) {
        let count = text.chars().count();
        self.ensure_line_width(line, col + count);
        for (i, ch) in text.chars().enumerate() {
            let cell = &mut self.lines[line][col + i];
            if info.important || !cell.important {
                *cell = Cell {
                    glyph: ch,
                    style: info.style,
                    important: info.important,
                };
            }
        }
    }

    pub fn draw_row(
        &mut self,
        line: usize,
        col: usize,
        width: usize,
        ch: char,
        info: DrawInfo,
        skip_important: bool,
    ) {
        self.ensure_line_width(line, col + width);
        for i in 0..width {
            let cell = &mut self.lines[line][col + i];
            if skip_important && cell.important {
                continue;
            }
            if info.important || !cell.important {
                *cell = Cell {
                    glyph: ch,
                    style: info.style,
                    important: info.important,
                };
            }
        }
    }

    pub fn draw_column(
        &mut self,
        line: usize,
        col: usize,
        height: usize,
        ch: char,
        info: DrawInfo,
        skip_important: bool,
    ) {
        self.ensure_lines(line + height);
        for i in 0..height {
            self.ensure_line_width(line + i, col + 1);
            let cell = &mut self.lines[line + i][col];
            if skip_important && cell.important {
                continue;
            }
            if info.important || !cell.important {
                *cell = Cell {
                    glyph: ch,
                    style: info.style,
                    important: info.important,
                };
            }
        }
    }

    pub fn draw_overline(&mut self, line: usize, col: usize, width: usize, info: DrawInfo) {
        self.draw_row(line, col, width, '\u{203e}', info, false);
    }

    /// Draws a bracket spanning `[col, col + width)` starting at `line` and
    /// reaching `height` rows down, with side pipes, a bottom bar, and
    /// corners. When `tail` is set, a one-cell stem extends below the
    /// bottom-centre, for landing on a free line further down.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_horizontal_bracket(
        &mut self,
        line: usize,
        col: usize,
        height: usize,
        width: usize,
        info: DrawInfo,
        unicode: bool,
        tail: bool,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let (side, corner_left, corner_right, horiz) = if unicode {
            ('\u{2502}', '\u{2514}', '\u{2518}', '\u{2500}')
        } else {
            ('|', '\\', '/', '_')
        };
        self.draw_column(line, col, height, side, info, true);
        self.draw_column(line, col + width.saturating_sub(1), height, side, info, true);
        let bottom = line + height - 1;
        self.draw_row(bottom, col, width, horiz, info, true);
        self.draw_string(bottom, col, &corner_left.to_string(), info);
        self.draw_string(bottom, col + width - 1, &corner_right.to_string(), info);
        if tail {
            let mid = col + width / 2;
            let vert = if unicode { '\u{2502}' } else { '|' };
            self.draw_string(bottom + 1, mid, &vert.to_string(), info);
        }
    }

    /// Starting at `start_line`, steps downward (by `vertical_step` once a
    /// contiguous search has begun) looking for `height` consecutive lines
    /// where `[col - gap, col + width + gap)` contain no `important` cells.
    /// Unbounded downward.
    pub fn find_free_space(
        &self,
        start_line: usize,
        col: usize,
        height: usize,
        width: usize,
        gap: usize,
        vertical_step: usize,
    ) -> usize {
        let lo = col.saturating_sub(gap);
        let hi = col + width + gap;
        let mut candidate = start_line;
        loop {
            if self.region_is_free(candidate, height, lo, hi) {
                return candidate;
            }
            candidate += vertical_step.max(1);
        }
    }

    fn region_is_free(&self, top: usize, height: usize, lo: usize, hi: usize) -> bool {
        for line in top..top + height {
            if let Some(row) = self.lines.get(line) {
                for cell in row.iter().take(hi).skip(lo) {
                    if cell.important {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Renders the canvas through `terminal`, emitting an ANSI delta only
    /// right before the next visible (non-space) glyph whose style differs
    /// from what's currently active.
    pub fn render(&self, terminal: &dyn Terminal, unicode: bool) -> String {
        let mut out = String::new();
        for row in &self.lines {
            let trailing = row
                .iter()
                .rposition(|c| c.glyph != ' ')
                .map(|i| i + 1)
                .unwrap_or(0);
            let mut current = Style::default();
            let mut touched = false;
            for cell in &row[..trailing] {
                if cell.glyph == ' ' {
                    out.push(' ');
                    continue;
                }
                if cell.style != current {
                    out.push_str(&terminal.ansi_delta(current, cell.style));
                    current = cell.style;
                    touched = true;
                }
                out.push(if unicode {
                    cell.glyph
                } else {
                    ascii_fallback(cell.glyph)
                });
            }
            if touched && current != Style::default() {
                out.push_str(&terminal.reset_string());
            }
            out.push('\n');
        }
        out
    }
}

fn ascii_fallback(ch: char) -> char {
    match ch {
        '\u{2502}' => '|',
        '\u{2500}' => '_',
        '\u{2514}' => '\\',
        '\u{2518}' => '/',
        '\u{203e}' => '^',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::PlainTerminal;

    #[test]
    fn draw_string_writes_glyphs() {
        let mut c = Canvas::new();
        c.draw_string(0, 2, "hi", DrawInfo::plain());
        let out = c.render(&PlainTerminal, true);
        assert_eq!(out.lines().next().unwrap(), "  hi");
    }

    #[test]
    fn important_cells_block_overwrite_by_non_important() {
        let mut c = Canvas::new();
        c.draw_string(0, 0, "X", DrawInfo::plain().important());
        c.draw_row(0, 0, 1, 'Y', DrawInfo::plain(), true);
        let out = c.render(&PlainTerminal, true);
        assert_eq!(out.lines().next().unwrap(), "X");
    }

    #[test]
    fn find_free_space_skips_occupied_rows() {
        let mut c = Canvas::new();
        c.draw_string(0, 0, "busy", DrawInfo::plain().important());
        let line = c.find_free_space(0, 0, 1, 4, 0, 1);
        assert_eq!(line, 1);
    }

    #[test]
    fn find_free_space_returns_start_when_clear() {
        let c = Canvas::new();
        let line = c.find_free_space(3, 0, 1, 4, 0, 1);
        assert_eq!(line, 3);
    }
}
