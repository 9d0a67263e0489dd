use chip8::prelude::*;

/// Maze generator by David Winter.
#[rustfmt::skip]
const MAZE: &[u8] = &[
    0x60, 0x00, 0x61, 0x00, 0xA2, 0x22, 0xC2, 0x01,
    0x32, 0x01, 0xA2, 0x1E, 0xD0, 0x14, 0x70, 0x04,
    0x30, 0x40, 0x12, 0x04, 0x60, 0x00, 0x71, 0x04,
    0x31, 0x20, 0x12, 0x04, 0x12, 0x1C, 0x80, 0x40,
    0x20, 0x10, 0x20, 0x40, 0x80, 0x10,
];

#[test]
fn test_disassemble_maze() {
    let disasm = Disassembler::new(MAZE);

    let mut buf = String::new();
    disasm.disassemble(&mut buf).unwrap();
    println!("{buf}");

    let lines: Vec<&str> = buf.lines().collect();
    assert_eq!(lines.len(), MAZE.len() / 2);
    assert_eq!(lines[0], "0200: 6000  LD v0, 0");
    assert_eq!(lines[2], "0204: A222  LD I, 0x222");
    assert_eq!(lines[3], "0206: C201  RND v2, 1");
    assert_eq!(lines[6], "020C: D014  DRW v0, v1, 4");
    assert_eq!(lines[9], "0212: 1204  JP 0x204");
    assert_eq!(lines[14], "021C: 121C  JP 0x21C");
}

#[test]
fn test_maze_draws() {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(1),
        ..Default::default()
    });
    vm.load_bytecode(MAZE).unwrap();

    // Enough to fill the whole screen with 8 rows of 16 tiles.
    vm.run_steps(2000).unwrap();

    // Settles into the final loop.
    assert_eq!(vm.program_counter(), 0x21C);
    assert_eq!(vm.registers()[1], 0x20);
    assert!(vm.display_buffer().iter().any(|px| *px));
}

#[test]
fn test_decode_from_bytes() {
    assert_eq!(Op::from_bytes([0x00, 0xE0]), Op::ClearScreen);
    assert_eq!(Op::decode(0x00EE), Op::Return);
    assert_eq!(Op::decode(0x5121), Op::Unknown(0x5121));
}
