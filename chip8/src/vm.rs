//! Virtual machine.
use std::{
    fmt::{self, Write},
    thread,
    time::Duration,
};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use crate::{
    bytecode::Op,
    clock::Clock,
    constants::*,
    cpu::Chip8Cpu,
    devices::{KeyCode, KeySnapshot},
    display::{draw_sprite, Chip8DisplayBuffer},
    error::{Chip8Error, Chip8Result},
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    /// Source of random bytes for `Cxnn (RND Vx, byte)`.
    rng: Box<dyn RngCore + Send>,
    /// Paces instruction execution.
    clock: Clock,
    /// Paces the 60Hz delay and sound timers.
    timer: Clock,
    conf: Chip8Conf,
}

impl Chip8Vm {
    /// Create a VM with a random number generator seeded from
    /// the configuration, or from system entropy when no seed is given.
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(conf, rng)
    }

    /// Create a VM that draws random numbers from the given generator.
    pub fn with_rng(conf: Chip8Conf, rng: impl RngCore + Send + 'static) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng: Box::new(rng),
            clock: Clock::new(conf.clock_frequency.unwrap_or_default().into()),
            timer: Clock::timer(),
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    pub fn load_builtin_font(&mut self) -> Chip8Result<()> {
        self.load_font(&FONTSET)
    }

    pub fn load_font(&mut self, fontset: &[u8]) -> Chip8Result<()> {
        if fontset.len() != FONTSET_DATA_LENGTH {
            return Err(Chip8Error::Font(format!(
                "fontset data must be {FONTSET_DATA_LENGTH} bytes, got {}",
                fontset.len()
            )));
        }

        let start = FONTSET_START as usize;
        self.cpu.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(fontset);
        debug!("loaded {} bytes of font data at 0x{start:03X}", fontset.len());

        Ok(())
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram);
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.clear_memory();
        self.cpu.clear_registers();

        // Reset fonts
        self.load_builtin_font()?;

        // Load program into virtual RAM
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);
        debug!("loaded program of {} bytes", bytecode.len());

        // Reset the program counter to prepare for execution.
        self.cpu.pc = MEM_START as Address;

        self.reset();

        Ok(())
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer {
        &self.cpu.display
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn program_counter(&self) -> Address {
        self.cpu.pc
    }

    pub fn index_register(&self) -> Address {
        self.cpu.address
    }

    pub fn stack_pointer(&self) -> usize {
        self.cpu.sp
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    pub fn memory(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }

    /// Whether the machine is stalled on `Fx0A (LD Vx, K)`.
    pub fn is_waiting_key(&self) -> bool {
        self.cpu.key_wait.is_some()
    }

    /// Whether the interrupt flag is set, either by request or by a fatal error.
    pub fn is_interrupted(&self) -> bool {
        self.cpu.trap
    }
}

/// Checks whether the given bytecode fits in the program area of memory.
fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() <= MAX_PROGRAM_SIZE
}

/// Outcome of a single interpreter step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display buffer was changed.
    Draw,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// No clock cycle was due, so nothing was executed.
    Idle,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Chip8Conf {
    /// Instruction rate. Runs as fast as possible when not set.
    pub clock_frequency: Option<Hz>,
    /// Seed for the random number generator, for reproducible runs.
    pub rng_seed: Option<u64>,
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Replace the whole keyboard input state.
    pub fn set_keys(&mut self, keys: KeySnapshot) {
        self.cpu.set_key_snapshot(keys);
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    /// Count down the delay and sound timers once.
    ///
    /// Should be called at 60Hz, regardless of the instruction rate.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_timers();
    }

    /// Request the interpreter to stop at the next step.
    pub fn interrupt(&mut self) {
        self.cpu.interrupt();
    }

    /// Clear the interrupt flag so execution can continue.
    pub fn resume(&mut self) {
        self.cpu.trap = false;
    }

    /// Clear internal state in preparation for a fresh startup.
    fn reset(&mut self) {
        self.cpu.trap = false;
        self.clock.reset();
        self.timer.reset();
    }

    /// Run the program until it is interrupted, stalls on a key press,
    /// or a fatal error occurs.
    ///
    /// Instructions and timers are paced against wall time.
    ///
    /// Returns [`Flow::KeyWait`] when the program is waiting for input,
    /// so the caller can update the keyboard state and call this again.
    pub fn execute(&mut self) -> Chip8Result<Flow> {
        loop {
            match self.poll()? {
                Flow::Interrupt => return Ok(Flow::Interrupt),
                Flow::KeyWait => return Ok(Flow::KeyWait),
                Flow::Idle => thread::yield_now(),
                _ => {}
            }
        }
    }

    /// Execute up to the given number of instructions, without pacing.
    ///
    /// Returns the flow of the last step.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut control_flow = Flow::Ok;

        for _ in 0..step_count {
            control_flow = self.step()?;
            if control_flow == Flow::Interrupt {
                break;
            }
        }

        Ok(control_flow)
    }

    /// Cooperative scheduling quantum.
    ///
    /// Counts down the timers when a 60Hz cycle has elapsed, then
    /// executes one instruction when a CPU clock cycle is due.
    pub fn poll(&mut self) -> Chip8Result<Flow> {
        if self.cpu.trap {
            return Ok(Flow::Interrupt);
        }

        if self.timer.tick() {
            self.tick_timers();
        }

        if self.clock.is_unthrottled() || self.clock.tick() {
            self.step()
        } else {
            Ok(Flow::Idle)
        }
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// A fatal error sets the interrupt flag, so the machine stays
    /// halted until [`Chip8Vm::resume`] is called.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if self.cpu.trap {
            // Interrupt signal is set.
            return Ok(Flow::Interrupt);
        }

        if let Some(vx) = self.cpu.key_wait {
            return Ok(self.poll_key_wait(vx));
        }

        let word = self.cpu.fetch();
        let op = Op::decode(word);
        op_trace(&self.cpu, word, op);

        let result = self.exec(op);
        if let Err(ref err) = result {
            warn!("halting VM: {err}");
            self.cpu.trap = true;
        }

        result
    }

    /// Skip the next instruction when the condition holds.
    #[inline(always)]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.cpu.pc = self.cpu.pc.wrapping_add(2);
        }
    }

    /// Check the keyboard while stalled on `Fx0A (LD Vx, K)`.
    ///
    /// The program counter is already past the instruction, so once a
    /// key is stored, execution simply continues with the next step.
    fn poll_key_wait(&mut self, vx: u8) -> Flow {
        match self.cpu.first_key() {
            Some(key) => {
                self.cpu.registers[vx as usize] = key;
                self.cpu.key_wait = None;
                Flow::Ok
            }
            None => Flow::KeyWait,
        }
    }

    /// Execute a decoded instruction.
    ///
    /// The program counter has already been advanced past the instruction.
    fn exec(&mut self, op: Op) -> Chip8Result<Flow> {
        let mut control_flow = Flow::Ok;

        match op {
            // 0nnn (SYS addr)
            //
            // Machine code routines are not supported.
            Op::Sys { .. } => { /* No Op */ }
            // 00E0 (CLS)
            //
            // Clear display
            Op::ClearScreen => {
                self.cpu.clear_display();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            Op::Return => {
                self.cpu.pc = self.cpu.pop_return()?;
                control_flow = Flow::Jump;
            }
            // 1nnn (JP addr)
            //
            // Jump to address.
            Op::JumpAddress { address } => {
                self.cpu.pc = address;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at NNN.
            // The return address is the instruction after the call.
            Op::Call { address } => {
                self.cpu.push_return(self.cpu.pc)?;
                self.cpu.pc = address;
                control_flow = Flow::Jump;
            }
            // 3xnn (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            Op::Skip_Eq_Byte { vx, nn } => {
                self.skip_if(self.cpu.registers[vx as usize] == nn);
            }
            // 4xnn (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            Op::Skip_NotEq_Byte { vx, nn } => {
                self.skip_if(self.cpu.registers[vx as usize] != nn);
            }
            // 5xy0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            Op::Skip_Eq { vx, vy } => {
                let x = self.cpu.registers[vx as usize];
                let y = self.cpu.registers[vy as usize];
                self.skip_if(x == y);
            }
            // 6xnn (LD Vx, byte)
            //
            // Set register VX to value NN.
            Op::Load_Byte { vx, nn } => {
                self.cpu.registers[vx as usize] = nn;
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            Op::Add_Byte { vx, nn } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x.wrapping_add(nn);
            }
            // 8xy0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            Op::Load_Vx_Vy { vx, vy } => {
                self.cpu.registers[vx as usize] = self.cpu.registers[vy as usize];
            }
            // 8xy1 (OR Vx, Vy)
            Op::Or_Vx_Vy { vx, vy } => {
                self.cpu.registers[vx as usize] |= self.cpu.registers[vy as usize];
            }
            // 8xy2 (AND Vx, Vy)
            Op::And_Vx_Vy { vx, vy } => {
                self.cpu.registers[vx as usize] &= self.cpu.registers[vy as usize];
            }
            // 8xy3 (XOR Vx, Vy)
            Op::Xor_Vx_Vy { vx, vy } => {
                self.cpu.registers[vx as usize] ^= self.cpu.registers[vy as usize];
            }
            // 8xy4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            //
            // The flag is written last, so it wins when VX is VF.
            Op::Add_Vx_Vy { vx, vy } => {
                let (x, y) = (
                    self.cpu.registers[vx as usize],
                    self.cpu.registers[vy as usize],
                );
                let (result, carry) = x.overflowing_add(y);
                self.cpu.registers[vx as usize] = result;
                self.cpu.registers[FLAG_REGISTER] = carry as u8;
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (x, y) = (
                    self.cpu.registers[vx as usize],
                    self.cpu.registers[vy as usize],
                );
                let (result, borrow) = x.overflowing_sub(y);
                self.cpu.registers[vx as usize] = result;
                self.cpu.registers[FLAG_REGISTER] = !borrow as u8;
            }
            // 8xy6 (SHR Vx)
            //
            // If the least-significant bit of Vx is 1, then VF is set to 1, otherwise 0.
            // Shift VX right by 1.
            Op::ShiftRight { vx } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x >> 1;
                self.cpu.registers[FLAG_REGISTER] = x & 1;
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (x, y) = (
                    self.cpu.registers[vx as usize],
                    self.cpu.registers[vy as usize],
                );
                let (result, borrow) = y.overflowing_sub(x);
                self.cpu.registers[vx as usize] = result;
                self.cpu.registers[FLAG_REGISTER] = !borrow as u8;
            }
            // 8xyE (SHL Vx)
            //
            // If the most-significant bit of Vx is 1, then VF is set to 1, otherwise 0.
            // Shift VX left by 1.
            Op::ShiftLeft { vx } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x << 1;
                self.cpu.registers[FLAG_REGISTER] = (x >> 7) & 1;
            }
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            Op::Skip_NotEq { vx, vy } => {
                let x = self.cpu.registers[vx as usize];
                let y = self.cpu.registers[vy as usize];
                self.skip_if(x != y);
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            Op::Load_Address { address } => {
                self.cpu.address = address;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to location NNN + V0.
            Op::Jump_V0 { address } => {
                self.cpu.pc = address + self.cpu.registers[0] as Address;
                control_flow = Flow::Jump;
            }
            // Cxnn (RND Vx, byte)
            //
            // Generate random number.
            // Set register VX to the result of bitwise AND between a random number and NN.
            Op::Random { vx, nn } => {
                self.cpu.registers[vx as usize] = nn & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            Op::Draw { vx, vy, n } => {
                self.draw(vx, vy, n);
                control_flow = Flow::Draw;
            }
            // Ex9E (SKP Vx)
            //
            // Skip the next instruction if the key with the value of Vx is pressed.
            Op::Skip_Key { vx } => {
                let key = self.cpu.registers[vx as usize] & 0xF;
                self.skip_if(self.cpu.key_state(key));
            }
            // ExA1 (SKNP Vx)
            Op::Skip_NotKey { vx } => {
                let key = self.cpu.registers[vx as usize] & 0xF;
                self.skip_if(!self.cpu.key_state(key));
            }
            // Fx07 (LD Vx, DT)
            //
            // The value of DT is placed into Vx.
            Op::Load_Vx_Delay { vx } => {
                self.cpu.registers[vx as usize] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // The machine is put in a waiting state, which is checked at
            // the start of every following step until a key is down.
            Op::Wait_Key { vx } => {
                self.cpu.key_wait = Some(vx);
                control_flow = self.poll_key_wait(vx);
            }
            // Fx15 (LD DT, Vx)
            Op::Load_Delay_Vx { vx } => {
                self.cpu.delay_timer = self.cpu.registers[vx as usize];
            }
            // Fx18 (LD ST, Vx)
            Op::Load_Sound_Vx { vx } => {
                self.cpu.sound_timer = self.cpu.registers[vx as usize];
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. No flag is set.
            Op::Add_Address_Vx { vx } => {
                let x = self.cpu.registers[vx as usize] as Address;
                self.cpu.address = self.cpu.address.wrapping_add(x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::Load_Font { vx } => {
                let x = self.cpu.registers[vx as usize] as Address;
                self.cpu.address = FONTSET_START + x * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Op::Store_Bcd { vx } => {
                let addr = self.cpu.address as usize;
                let x = self.cpu.registers[vx as usize];
                self.cpu.poke(addr,     x / 100);
                self.cpu.poke(addr + 1, x / 10 % 10);
                self.cpu.poke(addr + 2, x % 10);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            Op::Store_Registers { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    self.cpu.poke(addr + v, self.cpu.registers[v]);
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Op::Load_Registers { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    self.cpu.registers[v] = self.cpu.peek(addr + v);
                }
            }
            // Unknown encodings are skipped over.
            Op::Unknown(_) => { /* No Op */ }
        }

        Ok(control_flow)
    }

    /// Draw an N-byte sprite read from memory at I, at the coordinate
    /// in registers Vx and Vy.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn draw(&mut self, vx: u8, vy: u8, n: u8) {
        let (x, y) = (
            self.cpu.registers[vx as usize],
            self.cpu.registers[vy as usize],
        );

        // Iteration from pointer in address register I to number of rows specified by opcode value N.
        let addr = self.cpu.address as usize;
        let mut sprite = [0u8; 0xF];
        for (r, row) in sprite.iter_mut().take(n as usize).enumerate() {
            *row = self.cpu.peek(addr + r);
        }

        let is_erased = draw_sprite(
            &mut self.cpu.display,
            x,
            y,
            sprite.iter().take(n as usize).copied(),
        );

        // If a pixel was erased, then a collision occurred.
        self.cpu.registers[FLAG_REGISTER] = is_erased as u8;
    }
}

/// Troubleshooting
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, self.cpu.peek(i + 1))?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }

    /// One line summary of the registers, and the next instruction.
    pub fn dump_state(&self) -> Result<String, fmt::Error> {
        let cpu = &self.cpu;
        let mut buf = String::new();

        write!(
            buf,
            "PC:0x{:04X} I:0x{:04X} SP:{} DT:{} ST:{} | V:",
            cpu.pc, cpu.address, cpu.sp, cpu.delay_timer, cpu.sound_timer
        )?;
        for v in cpu.registers.iter() {
            write!(buf, "{v:02X} ")?;
        }
        write!(buf, "| Instr:0x{:04X}", u16::from_be_bytes(cpu.instr()))?;

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(cpu: &Chip8Cpu, word: u16, op: Op) {
    log::trace!("{:04X}: {:04X} {}", cpu.current_instr_addr(), word, op);
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: &Chip8Cpu, _: u16, _: Op) {}
