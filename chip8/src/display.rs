//! Display compositing.
use crate::constants::*;

/// Monochrome display buffer, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [bool; DISPLAY_BUFFER_SIZE];

/// XOR a sprite onto the display buffer, at coordinate `(x, y)`.
///
/// Sprites are 8 pixels wide, one byte per row, most significant bit
/// on the left. Pixels that fall outside the display are wrapped
/// around to the other side.
///
/// Returns `true` when any lit pixel was erased, which is used by
/// programs for collision detection.
pub fn draw_sprite<I>(display: &mut [bool; DISPLAY_BUFFER_SIZE], x: u8, y: u8, rows: I) -> bool
where
    I: IntoIterator<Item = u8>,
{
    // Coordinates are widened before adding the offsets, so the
    // sum can't wrap around 8 bits before being wrapped to the display.
    let (x, y) = (x as usize, y as usize);
    let mut is_erased = false;

    for (r, row) in rows.into_iter().enumerate() {
        let py = (y + r) % DISPLAY_HEIGHT;

        // Each row is 8 bits representing the 8 pixels of the sprite.
        for c in 0..SPRITE_WIDTH {
            if (row >> (7 - c)) & 1 == 0 {
                // XOR with a zero bit leaves the pixel unchanged.
                continue;
            }

            let px = (x + c) % DISPLAY_WIDTH;
            let d = px + py * DISPLAY_WIDTH;

            // XOR erases a pixel when both the old and new values are both 1.
            is_erased |= display[d];
            display[d] = !display[d];
        }
    }

    is_erased
}

/// Test whether the pixel at `(x, y)` is lit.
///
/// Coordinates outside the display are wrapped.
#[inline]
pub fn pixel(display: &[bool; DISPLAY_BUFFER_SIZE], x: usize, y: usize) -> bool {
    display[(x % DISPLAY_WIDTH) + (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH]
}

#[cfg(test)]
mod test {
    use super::*;

    fn blank() -> Box<[bool; DISPLAY_BUFFER_SIZE]> {
        Box::new([false; DISPLAY_BUFFER_SIZE])
    }

    #[test]
    fn test_draw_wraps_horizontally() {
        let mut display = blank();

        let erased = draw_sprite(&mut display, 60, 0, [0b1111_1111]);
        assert!(!erased);

        for x in [60, 61, 62, 63, 0, 1, 2, 3] {
            assert!(pixel(&display, x, 0), "pixel {x} must be lit");
        }
        for x in 4..60 {
            assert!(!pixel(&display, x, 0), "pixel {x} must be unlit");
        }
        assert_eq!(display.iter().filter(|px| **px).count(), 8);
    }

    #[test]
    fn test_draw_wraps_near_byte_limit() {
        let mut display = blank();

        // 250 + 7 would overflow an 8-bit sum.
        draw_sprite(&mut display, 250, 254, [0b1000_0001, 0b1000_0001, 0b1000_0001]);

        // x: 250 % 64 = 58, 257 % 64 = 1
        // y: 254 % 32 = 30, 255 % 32 = 31, 256 % 32 = 0
        for y in [30, 31, 0] {
            assert!(pixel(&display, 58, y));
            assert!(pixel(&display, 1, y));
        }
        assert_eq!(display.iter().filter(|px| **px).count(), 6);
    }

    #[test]
    fn test_draw_twice_restores() {
        let mut display = blank();
        let sprite = [0xF0, 0x90, 0x90, 0x90, 0xF0];

        assert!(!draw_sprite(&mut display, 10, 5, sprite));
        assert!(display.iter().any(|px| *px));

        assert!(draw_sprite(&mut display, 10, 5, sprite));
        assert!(display.iter().all(|px| !*px));
    }

    #[test]
    fn test_zero_bits_do_not_collide() {
        let mut display = blank();

        // Lights pixels 8 to 11.
        draw_sprite(&mut display, 4, 0, [0b0000_1111]);
        // Blank row over the lit pixels.
        let erased = draw_sprite(&mut display, 8, 0, [0b0000_0000]);

        assert!(!erased);
        assert!(pixel(&display, 8, 0));
        assert!(pixel(&display, 11, 0));
    }
}
