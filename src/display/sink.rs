//! Display outputs.
//!
//! The Sense HAT matrix is a plain framebuffer device; we locate it by
//! name under /sys/class/graphics and write 64 RGB565 words per frame.
//! A crossterm preview and a null sink cover development and headless
//! operation; a push failure degrades to no-op with a single log line.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write as _};
use std::path::PathBuf;

use log::{debug, warn};

use crate::display::frame::{Frame, HEIGHT, PIXELS, WIDTH};
use crate::error::{Error, Result};

/// The framebuffer name the Sense HAT driver registers.
const SENSE_FB_NAME: &str = "RPi-Sense FB";

pub trait DisplaySink {
    fn push(&mut self, frame: &Frame);
    fn clear(&mut self);
}

/// The physical LED matrix.
pub struct LedMatrix {
    fb: File,
    path: PathBuf,
    write_failed: bool,
}

impl LedMatrix {
    pub fn open() -> Result<Self> {
        let path = Self::find_framebuffer()
            .ok_or_else(|| Error::DeviceUnavailable("no Sense HAT framebuffer found".into()))?;
        let fb = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", path.display(), e)))?;
        debug!("LED matrix on {}", path.display());
        Ok(Self {
            fb,
            path,
            write_failed: false,
        })
    }

    /// Scan /sys/class/graphics for the Sense HAT's framebuffer entry.
    fn find_framebuffer() -> Option<PathBuf> {
        let entries = fs::read_dir("/sys/class/graphics").ok()?;
        for entry in entries.flatten() {
            let fb_name = entry.file_name();
            let fb_name = fb_name.to_string_lossy();
            if !fb_name.starts_with("fb") {
                continue;
            }
            if let Ok(name) = fs::read_to_string(entry.path().join("name")) {
                if name.trim() == SENSE_FB_NAME {
                    return Some(PathBuf::from("/dev").join(fb_name.as_ref()));
                }
            }
        }
        None
    }

    fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        let words = frame.to_rgb565();
        let mut bytes = [0u8; PIXELS * 2];
        for (i, word) in words.iter().enumerate() {
            bytes[i * 2..i * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        self.fb.seek(SeekFrom::Start(0))?;
        self.fb.write_all(&bytes)
    }
}

impl DisplaySink for LedMatrix {
    fn push(&mut self, frame: &Frame) {
        match self.write_frame(frame) {
            Ok(()) => {
                if self.write_failed {
                    debug!("LED matrix write recovered");
                    self.write_failed = false;
                }
            }
            Err(e) => {
                if !self.write_failed {
                    warn!("LED matrix write to {} failed: {}", self.path.display(), e);
                    self.write_failed = true;
                }
            }
        }
    }

    fn clear(&mut self) {
        self.push(&Frame::black());
    }
}

/// Terminal rendering of the grid, two character cells per pixel.
pub struct TerminalPreview {
    out: std::io::Stdout,
}

impl TerminalPreview {
    pub fn new() -> Result<Self> {
        use crossterm::{cursor, execute, terminal};
        let mut out = std::io::stdout();
        execute!(
            out,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )
        .map_err(|e| Error::DeviceUnavailable(format!("terminal: {}", e)))?;
        Ok(Self { out })
    }
}

impl DisplaySink for TerminalPreview {
    fn push(&mut self, frame: &Frame) {
        use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor};
        use crossterm::{cursor, queue};

        let mut draw = || -> std::io::Result<()> {
            queue!(self.out, cursor::MoveTo(0, 0))?;
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    let p = frame.get(x, y);
                    queue!(
                        self.out,
                        SetBackgroundColor(Color::Rgb {
                            r: p.r,
                            g: p.g,
                            b: p.b
                        }),
                        Print("  ")
                    )?;
                }
                queue!(self.out, ResetColor, Print("\r\n"))?;
            }
            self.out.flush()
        };
        if let Err(e) = draw() {
            debug!("preview write failed: {}", e);
        }
    }

    fn clear(&mut self) {
        self.push(&Frame::black());
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        use crossterm::{cursor, execute};
        let _ = execute!(self.out, cursor::Show);
    }
}

/// Headless sink: every push is a no-op.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn push(&mut self, _frame: &Frame) {}
    fn clear(&mut self) {}
}
