//! Constant values of the Chip-8 architecture.

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 0x10; // 16

/// Index of register VF, the carry, borrow and collision flag.
pub const FLAG_REGISTER: usize = 0xF;

/// The lower memory space was historically used for the interpreter itself,
/// but is now used for fonts.
pub const MEM_START: usize = 0x200; // 512
pub const MEM_SIZE: usize = 0x1000; // 4096

/// Mask applied to addresses so memory access wraps around instead of faulting.
pub const MEM_MASK: usize = MEM_SIZE - 1;

/// Largest program that fits in memory after the reserved interpreter area.
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - MEM_START;

/// Levels of nesting allowed in the call stack.
///
/// Pushing beyond this depth is a fatal stack overflow.
pub const STACK_SIZE: usize = 0x10; // 16

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_BUFFER_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;

/// Sprites are always 8 pixels wide, one bit per pixel.
pub const SPRITE_WIDTH: usize = 8;

/// Number of clock cycles in a second that delay timers count down.
pub const DELAY_FREQUENCY: u64 = 60;

/// Number of nanoseconds in a second
#[doc(hidden)]
pub const NANOS_IN_SECOND: u64 = 1_000_000_000;

/// Time in nanoseconds a single timer cycle takes, precalculated.
pub const CLOCK_CYCLE_TIME: u64 = NANOS_IN_SECOND / DELAY_FREQUENCY;

/// Number of keys on the keyboard (0x0-0xF)
pub const KEY_COUNT: u8 = 16;

/// Address where the font glyphs start.
pub const FONTSET_START: u16 = 0x000;

/// Each font glyph is 5 rows of 8 pixels.
pub const FONTSET_HEIGHT: usize = 5;

/// Size of the whole fontset, 16 glyphs of 5 bytes.
pub const FONTSET_DATA_LENGTH: usize = 16 * FONTSET_HEIGHT;

/// Built-in hexadecimal digit glyphs 0-F.
#[rustfmt::skip]
pub const FONTSET: [u8; FONTSET_DATA_LENGTH] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Type for storing the 12-bit memory addresses.
pub type Address = u16;
