use chip8::{constants::*, prelude::*};

fn boot(program: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(0xC8),
        ..Default::default()
    });
    vm.load_bytecode(program).unwrap();
    vm
}

#[test]
fn test_add_registers_carry() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            #[rustfmt::skip]
            let mut vm = boot(&[
                0x60, a,    // LD v0, a
                0x61, b,    // LD v1, b
                0x80, 0x14, // ADD v0, v1
            ]);
            vm.run_steps(3).unwrap();

            let sum = a as u16 + b as u16;
            assert_eq!(vm.registers()[0], (sum % 256) as u8);
            assert_eq!(vm.registers()[0xF], (sum > 255) as u8, "{a} + {b}");
        }
    }
}

#[test]
fn test_sub_registers_not_borrow() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            #[rustfmt::skip]
            let mut vm = boot(&[
                0x60, a,    // LD v0, a
                0x61, b,    // LD v1, b
                0x80, 0x15, // SUB v0, v1
                0x6F, a,    // LD vF, a
                0x8F, 0x15, // SUB vF, v1
            ]);

            vm.run_steps(3).unwrap();
            assert_eq!(vm.registers()[0], a.wrapping_sub(b));
            assert_eq!(vm.registers()[0xF], (a >= b) as u8, "{a} - {b}");

            // Destination is the flag register itself.
            vm.run_steps(2).unwrap();
            assert_eq!(vm.registers()[0xF], (a >= b) as u8, "vF = {a} - {b}");
        }
    }
}

#[test]
#[rustfmt::skip]
fn test_draw_twice_restores_display() {
    let mut vm = boot(&[
        0x60, 0x0A, // LD v0, 10
        0x61, 0x03, // LD v1, 3
        0x62, 0x0E, // LD v2, 0xE
        0xF2, 0x29, // LD F, v2
        0xD0, 0x15, // DRW v0, v1, 5
        0xD0, 0x15, // DRW v0, v1, 5
    ]);

    assert_eq!(vm.run_steps(5).unwrap(), Flow::Draw);
    assert!(vm.display_buffer().iter().any(|px| *px));
    assert_eq!(vm.registers()[0xF], 0);

    assert_eq!(vm.run_steps(1).unwrap(), Flow::Draw);
    assert!(vm.display_buffer().iter().all(|px| !*px));
    assert_eq!(vm.registers()[0xF], 1);
}

#[test]
#[rustfmt::skip]
fn test_draw_wraps_at_right_edge() {
    let mut vm = boot(&[
        0xA2, 0x08, // LD I, .sprite
        0x60, 0x3C, // LD v0, 60
        0x61, 0x00, // LD v1, 0
        0xD0, 0x11, // DRW v0, v1, 1
        // .sprite
        0xFF, 0x00,
    ]);
    vm.run_steps(4).unwrap();

    let lit: Vec<usize> = (0..DISPLAY_WIDTH)
        .filter(|x| chip8::pixel(vm.display_buffer(), *x, 0))
        .collect();
    assert_eq!(lit, vec![0, 1, 2, 3, 60, 61, 62, 63]);
    assert_eq!(vm.display_buffer().iter().filter(|px| **px).count(), 8);
}

#[test]
#[rustfmt::skip]
fn test_clear_then_blank_sprite() {
    let mut vm = boot(&[
        0x60, 0x08, // LD v0, 8
        0xF0, 0x29, // LD F, v0
        0xD0, 0x05, // DRW v0, v0, 5
        0x00, 0xE0, // CLS
        0xA2, 0x0E, // LD I, .blank
        0xD0, 0x04, // DRW v0, v0, 4
        0x12, 0x0C, // JP 0x20C
        // .blank
        0x00, 0x00, 0x00, 0x00,
    ]);

    vm.run_steps(3).unwrap();
    assert!(vm.display_buffer().iter().any(|px| *px));

    vm.run_steps(3).unwrap();
    assert!(vm.display_buffer().iter().all(|px| !*px));
    assert_eq!(vm.registers()[0xF], 0);
}

#[test]
fn test_store_load_registers_roundtrip() {
    for x in 0..REGISTER_COUNT as u8 {
        let mut program = vec![];
        for v in 0..REGISTER_COUNT as u8 {
            program.extend([0x60 | v, v * 7 + 3]); // LD vV, value
        }
        program.extend([0xA3, 0x00]); // LD I, 0x300
        program.extend([0xF0 | x, 0x55]); // LD [I], vX
        for v in 0..REGISTER_COUNT as u8 {
            program.extend([0x60 | v, 0x00]); // LD vV, 0
        }
        program.extend([0xF0 | x, 0x65]); // LD vX, [I]

        let mut vm = boot(&program);
        vm.run_steps(program.len() / 2).unwrap();

        for v in 0..REGISTER_COUNT as u8 {
            let expected = if v <= x { v * 7 + 3 } else { 0 };
            assert_eq!(vm.registers()[v as usize], expected, "x = {x}, v = {v}");
            assert_eq!(vm.memory()[0x300 + v as usize], expected);
        }
        assert_eq!(vm.index_register(), 0x300, "index register must not move");
    }
}

#[test]
#[rustfmt::skip]
fn test_store_bcd() {
    let mut vm = boot(&[
        0xA3, 0x00, // LD I, 0x300
        0x60, 0xFF, // LD v0, 255
        0xF0, 0x33, // LD B, v0
        0xA3, 0x10, // LD I, 0x310
        0x61, 0x07, // LD v1, 7
        0xF1, 0x33, // LD B, v1
    ]);
    vm.run_steps(6).unwrap();

    assert_eq!(vm.memory()[0x300..0x303], [2, 5, 5]);
    assert_eq!(vm.memory()[0x310..0x313], [0, 0, 7]);
}

#[test]
#[rustfmt::skip]
fn test_call_return() {
    let mut vm = boot(&[
        0x22, 0x06, // CALL 0x206
        0x6A, 0x01, // LD vA, 1
        0x12, 0x04, // JP 0x204
        0x22, 0x0C, // CALL 0x20C
        0x00, 0xEE, // RET
        0x00, 0x00,
        0x00, 0xEE, // RET
    ]);

    assert_eq!(vm.step().unwrap(), Flow::Jump);
    assert_eq!(vm.program_counter(), 0x206);
    assert_eq!(vm.stack_pointer(), 1);

    assert_eq!(vm.step().unwrap(), Flow::Jump);
    assert_eq!(vm.program_counter(), 0x20C);
    assert_eq!(vm.stack_pointer(), 2);

    assert_eq!(vm.step().unwrap(), Flow::Jump);
    assert_eq!(vm.program_counter(), 0x208);
    assert_eq!(vm.stack_pointer(), 1);

    assert_eq!(vm.step().unwrap(), Flow::Jump);
    assert_eq!(vm.program_counter(), 0x202);
    assert_eq!(vm.stack_pointer(), 0);

    vm.step().unwrap();
    assert_eq!(vm.registers()[0xA], 1);
}

#[test]
fn test_call_stack_overflow() {
    // Subroutine that calls itself forever.
    let mut vm = boot(&[0x22, 0x00]); // CALL 0x200

    for depth in 1..=STACK_SIZE {
        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.stack_pointer(), depth);
    }

    let err = vm.step().unwrap_err();
    assert!(matches!(err, Chip8Error::StackOverflow { address: 0x200 }));
    assert_eq!(vm.stack_pointer(), STACK_SIZE);

    // Halted until resumed.
    assert!(vm.is_interrupted());
    assert_eq!(vm.step().unwrap(), Flow::Interrupt);
}

#[test]
#[rustfmt::skip]
fn test_skip_key_pressed() {
    let program = [
        0x60, 0x07, // LD v0, 7
        0xE0, 0x9E, // SKP v0
        0x00, 0x00,
        0x00, 0x00,
    ];

    let mut vm = boot(&program);
    vm.run_steps(2).unwrap();
    assert_eq!(vm.program_counter(), 0x204);

    let mut vm = boot(&program);
    vm.set_keys(KeyCode::snapshot(&[KeyCode::Key3]));
    vm.run_steps(2).unwrap();
    assert_eq!(vm.program_counter(), 0x204);

    let mut vm = boot(&program);
    vm.set_keys(KeyCode::snapshot(&[KeyCode::Key7]));
    vm.run_steps(2).unwrap();
    assert_eq!(vm.program_counter(), 0x206);
}

#[test]
#[rustfmt::skip]
fn test_skip_key_not_pressed() {
    let program = [
        0x60, 0x0B, // LD v0, 0xB
        0xE0, 0xA1, // SKNP v0
        0x00, 0x00,
        0x00, 0x00,
    ];

    let mut vm = boot(&program);
    vm.run_steps(2).unwrap();
    assert_eq!(vm.program_counter(), 0x206);

    let mut vm = boot(&program);
    vm.set_key(KeyCode::KeyB, true);
    vm.run_steps(2).unwrap();
    assert_eq!(vm.program_counter(), 0x204);

    vm.clear_keys();
    vm.run_steps(1).unwrap();
    assert_eq!(vm.program_counter(), 0x206);
}

#[test]
#[rustfmt::skip]
fn test_tick_timers_independently() {
    let mut vm = boot(&[
        0x60, 0x05, // LD v0, 5
        0xF0, 0x15, // LD DT, v0
    ]);
    vm.run_steps(2).unwrap();

    vm.tick_timers();
    assert_eq!(vm.delay_timer(), 4);
    assert_eq!(vm.sound_timer(), 0);

    let mut vm = boot(&[
        0x60, 0x05, // LD v0, 5
        0xF0, 0x18, // LD ST, v0
    ]);
    vm.run_steps(2).unwrap();

    vm.tick_timers();
    assert_eq!(vm.delay_timer(), 0);
    assert_eq!(vm.sound_timer(), 4);
}

#[test]
#[rustfmt::skip]
fn test_key_wait_holds_program_counter() {
    let mut vm = boot(&[
        0xF4, 0x0A, // LD v4, K
        0x12, 0x02, // JP 0x202
    ]);

    for _ in 0..3 {
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);
    }
    assert_eq!(vm.program_counter(), 0x202);

    // Timers keep running while stalled.
    vm.tick_timers();

    vm.set_keys(KeyCode::snapshot(&[KeyCode::KeyE, KeyCode::Key2]));
    assert_eq!(vm.step().unwrap(), Flow::Ok);
    assert_eq!(vm.registers()[4], 0x2);
    assert_eq!(vm.step().unwrap(), Flow::Jump);
}

#[test]
fn test_reload_resets_state() {
    let mut vm = boot(&[0x22, 0x00]); // CALL 0x200
    vm.run_steps(4).unwrap();
    assert_eq!(vm.stack_pointer(), 4);

    vm.load_bytecode(&[0x60, 0x01]).unwrap();
    assert_eq!(vm.stack_pointer(), 0);
    assert_eq!(vm.program_counter(), MEM_START as Address);
    assert_eq!(vm.memory()[MEM_START..MEM_START + 2], [0x60, 0x01]);
    assert_eq!(&vm.memory()[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
}

#[test]
fn test_dump_display() {
    let vm = boot(&[]);
    let dump = vm.dump_display().unwrap();

    assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);
    assert!(dump.lines().all(|line| line == ".".repeat(DISPLAY_WIDTH)));
}
