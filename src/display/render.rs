//! Frame compositors: spectrum bars, scrolling text, icons and the idle
//! spinner. All of these draw at full intensity; the controller applies
//! the time-of-day brightness to the finished frame.

use crate::config::ColorSettings;
use crate::display::font;
use crate::display::frame::{Frame, Rgb, HEIGHT, WIDTH};

/// Draw vertical bars, one per band, growing from the bottom row. The
/// lower rows are the "low" color, the middle "mid", the top "high".
pub fn render_bars(frame: &mut Frame, levels: &[f32], colors: &ColorSettings) {
    for (x, level) in levels.iter().enumerate().take(WIDTH) {
        let bar_height = (level.clamp(0.0, 1.0) * HEIGHT as f32).round() as usize;
        for row in 0..bar_height.min(HEIGHT) {
            let color = if row <= 2 {
                colors.bar_low
            } else if row <= 4 {
                colors.bar_mid
            } else {
                colors.bar_high
            };
            frame.set(x as i32, (HEIGHT - 1 - row) as i32, color.into());
        }
    }
}

/// Restartable right-to-left text scroll. One `step()` shifts the window
/// by a column; the pass is complete when the text has fully left the
/// display.
pub struct Scroller {
    columns: Vec<u8>,
    offset: i32,
    color: Rgb,
}

impl Scroller {
    pub fn new(text: &str, color: Rgb) -> Self {
        Self {
            columns: font::text_columns(text),
            // Start fully off the right edge so the text slides in.
            offset: -(WIDTH as i32),
            color,
        }
    }

    /// Advance one column. Returns true once the pass is complete.
    pub fn step(&mut self) -> bool {
        self.offset += 1;
        self.done()
    }

    pub fn done(&self) -> bool {
        self.offset >= self.columns.len() as i32
    }

    pub fn render(&self, frame: &mut Frame) {
        for x in 0..WIDTH as i32 {
            let column = self.offset + x;
            if column < 0 || column >= self.columns.len() as i32 {
                continue;
            }
            let mask = self.columns[column as usize];
            for y in 0..font::GLYPH_HEIGHT {
                if mask & (1 << y) != 0 {
                    frame.set(x, font::GLYPH_TOP + y as i32, self.color);
                }
            }
        }
    }
}

/// Music-note glyph shown briefly when a new track arrives.
const NOTE_ROWS: [u8; 8] = [
    0b0011_1100,
    0b0100_0010,
    0b1001_1001,
    0b0010_0100,
    0b0100_0010,
    0b0001_1000,
    0b0010_0100,
    0b0000_0000,
];

pub fn render_note_icon(frame: &mut Frame, background: Rgb, note: Rgb) {
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let lit = NOTE_ROWS[y] & (1 << (WIDTH - 1 - x)) != 0;
            frame.set(x as i32, y as i32, if lit { note } else { background });
        }
    }
}

/// Diagonal cross shown when audio has been silent past the grace period.
pub fn render_no_audio(frame: &mut Frame, color: Rgb) {
    for i in 0..WIDTH as i32 {
        frame.set(i, i, color);
        frame.set(WIDTH as i32 - 1 - i, i, color);
    }
}

/// Inward spiral walked by the idle spinner.
const SPINNER_PATH: [(i32, i32); 64] = [
    (0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0), (7, 0),
    (7, 1), (7, 2), (7, 3), (7, 4), (7, 5), (7, 6), (7, 7),
    (6, 7), (5, 7), (4, 7), (3, 7), (2, 7), (1, 7), (0, 7),
    (0, 6), (0, 5), (0, 4), (0, 3), (0, 2), (0, 1),
    (1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1),
    (6, 2), (6, 3), (6, 4), (6, 5), (6, 6),
    (5, 6), (4, 6), (3, 6), (2, 6), (1, 6),
    (1, 5), (1, 4), (1, 3), (1, 2),
    (2, 2), (3, 2), (4, 2), (5, 2),
    (5, 3), (5, 4), (5, 5),
    (4, 5), (3, 5), (2, 5),
    (2, 4), (2, 3),
    (3, 3), (4, 3),
    (4, 4), (3, 4),
];

const TAIL_LENGTH: usize = 28;
const STEP_ADVANCE: usize = 4;

/// Ambient spiral animation with a fading tail, shown while idle.
pub struct Spinner {
    index: usize,
}

impl Spinner {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    pub fn step(&mut self) {
        self.index = (self.index + STEP_ADVANCE) % SPINNER_PATH.len();
    }

    /// Draw the head plus a fading tail, scaled by `pulse` (0..1).
    pub fn render(&self, frame: &mut Frame, color: Rgb, pulse: f32) {
        let pulse = pulse.clamp(0.0, 1.0);
        for i in 0..TAIL_LENGTH {
            let position = (self.index + SPINNER_PATH.len() - i) % SPINNER_PATH.len();
            let (x, y) = SPINNER_PATH[position];
            let fade = 1.0 - i as f32 / TAIL_LENGTH as f32;
            let scaled = color.scaled(pulse * fade);
            if scaled != Rgb::BLACK {
                frame.set(x, y, scaled);
            }
        }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_fill_bottom_up_with_tier_colors() {
        let colors = ColorSettings::default();
        let mut frame = Frame::black();
        render_bars(&mut frame, &[1.0, 0.5, 0.0], &colors);

        // Full bar: bottom green, top red.
        assert_eq!(frame.get(0, 7), colors.bar_low.into());
        assert_eq!(frame.get(0, 0), colors.bar_high.into());
        // Half bar: four pixels lit, none above.
        assert_eq!(frame.get(1, 4), colors.bar_mid.into());
        assert_eq!(frame.get(1, 3), Rgb::BLACK);
        // Zero band stays dark.
        for y in 0..8 {
            assert_eq!(frame.get(2, y), Rgb::BLACK);
        }
    }

    #[test]
    fn scroller_completes_exactly_one_pass() {
        let mut scroller = Scroller::new("AB", Rgb::new(255, 255, 255));
        // 2 glyphs x (3 columns + 1 gap), entering across the 8-wide grid.
        let expected_steps = 8 + 8;
        let mut steps = 0;
        while !scroller.step() {
            steps += 1;
            assert!(steps < 1000, "scroll never completed");
        }
        assert_eq!(steps + 1, expected_steps);
    }

    #[test]
    fn scroller_draws_pixels_mid_pass() {
        let mut scroller = Scroller::new("HI", Rgb::new(200, 200, 200));
        for _ in 0..8 {
            scroller.step();
        }
        let mut frame = Frame::black();
        scroller.render(&mut frame);
        assert!(!frame.is_black());
    }

    #[test]
    fn empty_text_scroll_finishes_immediately() {
        let mut scroller = Scroller::new("", Rgb::BLACK);
        let mut steps = 0;
        while !scroller.step() {
            steps += 1;
            assert!(steps < 100);
        }
        assert!(steps <= 8);
    }

    #[test]
    fn no_audio_cross_hits_corners() {
        let mut frame = Frame::black();
        let red = Rgb::new(255, 0, 0);
        render_no_audio(&mut frame, red);
        assert_eq!(frame.get(0, 0), red);
        assert_eq!(frame.get(7, 7), red);
        assert_eq!(frame.get(7, 0), red);
        assert_eq!(frame.get(0, 7), red);
        assert_eq!(frame.get(1, 0), Rgb::BLACK);
    }

    #[test]
    fn spinner_path_covers_every_pixel_once() {
        let mut seen = [[false; 8]; 8];
        for (x, y) in SPINNER_PATH {
            assert!(!seen[y as usize][x as usize], "duplicate at {},{}", x, y);
            seen[y as usize][x as usize] = true;
        }
    }

    #[test]
    fn spinner_renders_fading_tail() {
        let mut spinner = Spinner::new();
        spinner.step();
        let mut frame = Frame::black();
        spinner.render(&mut frame, Rgb::new(255, 0, 0), 1.0);
        // Head at full intensity, tail dimmer.
        let (hx, hy) = SPINNER_PATH[STEP_ADVANCE];
        let (tx, ty) = SPINNER_PATH[0];
        let head = frame.get(hx as usize, hy as usize);
        let tail = frame.get(tx as usize, ty as usize);
        assert!(head.r > tail.r);
        assert!(tail.r > 0);
    }
}
