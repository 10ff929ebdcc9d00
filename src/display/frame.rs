//! The 8x8 RGB pixel grid.

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 8;
pub const PIXELS: usize = WIDTH * HEIGHT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        Self {
            r: (self.r as f32 * factor) as u8,
            g: (self.g as f32 * factor) as u8,
            b: (self.b as f32 * factor) as u8,
        }
    }

    /// RGB565 word as expected by the Sense HAT framebuffer.
    pub fn to_rgb565(self) -> u16 {
        let r = (self.r as u16 >> 3) & 0x1f;
        let g = (self.g as u16 >> 2) & 0x3f;
        let b = (self.b as u16 >> 3) & 0x1f;
        (r << 11) | (g << 5) | b
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

/// One composed frame. (0, 0) is the top-left pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: [Rgb; PIXELS],
}

impl Frame {
    pub fn black() -> Self {
        Self {
            pixels: [Rgb::BLACK; PIXELS],
        }
    }

    /// Set one pixel; out-of-range coordinates are ignored.
    pub fn set(&mut self, x: i32, y: i32, color: Rgb) {
        if (0..WIDTH as i32).contains(&x) && (0..HEIGHT as i32).contains(&y) {
            self.pixels[y as usize * WIDTH + x as usize] = color;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.pixels[y * WIDTH + x]
    }

    pub fn is_black(&self) -> bool {
        self.pixels.iter().all(|p| *p == Rgb::BLACK)
    }

    /// All pixels scaled by a brightness factor in [0, 1].
    pub fn scaled(&self, factor: f32) -> Frame {
        let mut out = Frame::black();
        for (dst, src) in out.pixels.iter_mut().zip(&self.pixels) {
            *dst = src.scaled(factor);
        }
        out
    }

    /// Frame rotated clockwise by 0, 90, 180 or 270 degrees.
    pub fn rotated(&self, degrees: u16) -> Frame {
        let mut out = Frame::black();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let (sx, sy) = match degrees {
                    90 => (y, HEIGHT - 1 - x),
                    180 => (WIDTH - 1 - x, HEIGHT - 1 - y),
                    270 => (WIDTH - 1 - y, x),
                    _ => (x, y),
                };
                out.pixels[y * WIDTH + x] = self.get(sx, sy);
            }
        }
        out
    }

    /// Row-major RGB565 words for the framebuffer.
    pub fn to_rgb565(&self) -> [u16; PIXELS] {
        let mut out = [0u16; PIXELS];
        for (word, pixel) in out.iter_mut().zip(&self.pixels) {
            *word = pixel.to_rgb565();
        }
        out
    }
}
