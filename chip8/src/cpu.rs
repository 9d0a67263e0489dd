//! CPU and memory state.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Core state for a chip8 interpreter.
pub(crate) struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// Stack pointer, equal to the current depth of the call stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register (I) used as the base address for memory block instructions.
    ///
    /// Kept as a full 16-bit value; accesses through it wrap around memory.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0.
    pub(crate) sound_timer: u8,
    /// Register waiting to receive a keypress, set by `Fx0A (LD Vx, K)`.
    pub(crate) key_wait: Option<u8>,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Box<[Address; STACK_SIZE]>,
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,

    // ------------------------------------------------------------------------
    // Control
    /// Interrupt for VM loop.
    pub(crate) trap: bool,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: 0,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_wait: None,
            key_state: 0,

            ram: Box::new([0; MEM_SIZE]),
            stack: Box::new([0; STACK_SIZE]),
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),

            trap: false,
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
    }

    /// Zero all registers and timers, and drop any pending key wait.
    pub(crate) fn clear_registers(&mut self) {
        self.pc = 0;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_wait = None;
    }

    pub fn interrupt(&mut self) {
        self.trap = true;
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    // ------------------------------------------------------------------------
    // Keyboard

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    /// Replace the whole keyboard state with the given snapshot.
    pub fn set_key_snapshot(&mut self, keys: [bool; KEY_COUNT as usize]) {
        self.key_state = keys
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .fold(0u16, |acc, (key_id, _)| acc | (1u16 << key_id));
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the lowest key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    // ------------------------------------------------------------------------
    // Timers

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        // The checked_sub implementation uses `unlikely!()` which degrades performance.
        let (val, underflow) = self.delay_timer.overflowing_sub(1);
        if !underflow {
            self.delay_timer = val;
        }
    }

    #[inline]
    pub fn tick_sound(&mut self) {
        let (val, underflow) = self.sound_timer.overflowing_sub(1);
        if !underflow {
            self.sound_timer = val;
        }
    }

    /// Count down both timers, independently of each other.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.tick_delay();
        self.tick_sound();
    }

    // ------------------------------------------------------------------------
    // Memory

    /// Read a byte from memory, wrapping the address around the memory size.
    #[inline(always)]
    pub fn peek(&self, address: usize) -> u8 {
        self.ram[address & MEM_MASK]
    }

    /// Write a byte to memory, wrapping the address around the memory size.
    #[inline(always)]
    pub fn poke(&mut self, address: usize, value: u8) {
        self.ram[address & MEM_MASK] = value;
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> [u8; 2] {
        let pc = self.pc as usize;
        [self.peek(pc), self.peek(pc + 1)]
    }

    /// Read the instruction word at the program counter, and advance
    /// the program counter past it.
    #[inline(always)]
    pub fn fetch(&mut self) -> u16 {
        let [a, b] = self.instr();
        self.pc = self.pc.wrapping_add(2);
        u16::from_be_bytes([a, b])
    }

    /// Address of the instruction that was fetched last.
    #[inline(always)]
    pub(crate) fn current_instr_addr(&self) -> Address {
        self.pc.wrapping_sub(2)
    }

    // ------------------------------------------------------------------------
    // Call stack

    /// Push a return address onto the call stack.
    pub fn push_return(&mut self, return_address: Address) -> Chip8Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow {
                address: self.current_instr_addr(),
            });
        }

        self.stack[self.sp] = return_address;
        self.sp += 1;

        Ok(())
    }

    /// Pop the top return address off the call stack.
    pub fn pop_return(&mut self) -> Chip8Result<Address> {
        match self.sp.checked_sub(1) {
            Some(sp) => {
                self.sp = sp;
                Ok(self.stack[sp])
            }
            None => Err(Chip8Error::StackUnderflow {
                address: self.current_instr_addr(),
            }),
        }
    }
}
