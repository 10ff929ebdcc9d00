//! Tiny 3x5 bitmap font for the scrolling track line.
//!
//! Glyphs are authored as five 3-bit rows (MSB = left column) and exposed
//! as column bitmasks for the scroller. Lowercase maps to uppercase,
//! anything unknown renders as '?'.

/// Rows occupied by glyphs inside the 8-row matrix (vertically centered).
pub const GLYPH_TOP: i32 = 1;
pub const GLYPH_HEIGHT: usize = 5;
pub const GLYPH_WIDTH: usize = 3;

/// Blank columns between glyphs.
pub const GLYPH_GAP: usize = 1;

type Rows = [u8; GLYPH_HEIGHT];

const GLYPHS: &[(char, Rows)] = &[
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b110, 0b100, 0b110, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b110, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b110, 0b001, 0b010, 0b100, 0b111]),
    ('3', [0b110, 0b001, 0b010, 0b001, 0b110]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b110, 0b001, 0b110]),
    ('6', [0b011, 0b100, 0b110, 0b101, 0b010]),
    ('7', [0b111, 0b001, 0b010, 0b010, 0b010]),
    ('8', [0b010, 0b101, 0b010, 0b101, 0b010]),
    ('9', [0b010, 0b101, 0b011, 0b001, 0b110]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    ('\'', [0b010, 0b010, 0b000, 0b000, 0b000]),
    ('!', [0b010, 0b010, 0b010, 0b000, 0b010]),
    ('?', [0b110, 0b001, 0b010, 0b000, 0b010]),
    ('&', [0b010, 0b101, 0b010, 0b101, 0b011]),
    ('/', [0b001, 0b001, 0b010, 0b100, 0b100]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('+', [0b000, 0b010, 0b111, 0b010, 0b000]),
];

fn rows_for(c: char) -> Option<Rows> {
    let c = c.to_ascii_uppercase();
    GLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == c)
        .map(|(_, rows)| *rows)
}

/// Column bitmasks for one character, bit 0 = top row.
pub fn glyph_columns(c: char) -> Option<[u8; GLYPH_WIDTH]> {
    let rows = rows_for(c)?;
    let mut columns = [0u8; GLYPH_WIDTH];
    for (y, row) in rows.iter().enumerate() {
        for (x, column) in columns.iter_mut().enumerate() {
            if row & (1 << (GLYPH_WIDTH - 1 - x)) != 0 {
                *column |= 1 << y;
            }
        }
    }
    Some(columns)
}

/// Expand text into a flat scroll-column sequence: glyph columns with a
/// blank gap column after each, two blanks for a space.
pub fn text_columns(text: &str) -> Vec<u8> {
    let mut columns = Vec::new();
    for c in text.chars() {
        if c == ' ' {
            columns.extend([0, 0]);
            continue;
        }
        let glyph = glyph_columns(c).or_else(|| glyph_columns('?'));
        if let Some(glyph) = glyph {
            columns.extend(glyph);
            columns.extend(std::iter::repeat(0).take(GLYPH_GAP));
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_glyphs_fit_three_by_five() {
        for (c, rows) in GLYPHS {
            for row in rows {
                assert!(*row <= 0b111, "glyph {:?} wider than 3 columns", c);
            }
        }
    }

    #[test]
    fn columns_transpose_rows() {
        // 'L': left column solid, bottom row solid.
        let columns = glyph_columns('L').unwrap();
        assert_eq!(columns[0], 0b11111);
        assert_eq!(columns[1], 0b10000);
        assert_eq!(columns[2], 0b10000);
    }

    #[test]
    fn lowercase_maps_to_uppercase() {
        assert_eq!(glyph_columns('a'), glyph_columns('A'));
    }

    #[test]
    fn unknown_chars_render_as_question_mark() {
        let columns = text_columns("\u{263a}");
        assert_eq!(columns.len(), GLYPH_WIDTH + GLYPH_GAP);
        assert_eq!(&columns[..GLYPH_WIDTH], &glyph_columns('?').unwrap());
    }

    #[test]
    fn text_layout_counts_columns() {
        // Two glyphs with gaps plus a two-column space.
        assert_eq!(text_columns("A B").len(), 2 * (GLYPH_WIDTH + GLYPH_GAP) + 2);
        assert!(text_columns("").is_empty());
    }
}
