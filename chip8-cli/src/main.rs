//! Entrypoint for CLI
use std::{env, error::Error, fs, thread, time::Instant};

use chip8::{prelude::*, IMPL_VERSION};
use log::{debug, info, warn};

mod config;
mod error;

use self::{config::RunConfig, error::AppError};

static USAGE: &str = r#"
usage: chip8 CMD FILE [CONFIG]

commands:
    run     Run the target ROM file, then print the display
    dis     Disassemble the target ROM into readable assembly

examples:
    chip8 run maze.rom
    chip8 run breakout.rom breakout.yaml
    chip8 dis breakout.rom
"#;

fn run_bytecode(filepath: &str, config_path: Option<&str>) -> Result<(), AppError> {
    info!("running bytecode interpreter");

    let config = match config_path {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(config.vm.clone());
    vm.load_bytecode(bytecode.as_slice())?;
    vm.set_keys(config.key_snapshot());

    let start = Instant::now();
    let result = run_budget(&mut vm, config.step_budget());
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);
    debug!("{}", vm.dump_state()?);
    debug!("{}", vm.dump_keys()?);

    result?;

    Ok(())
}

/// Drive the VM until the step budget is spent, or it halts.
///
/// Every quantum that isn't idle counts against the budget, including
/// quanta spent waiting on a key.
fn run_budget(vm: &mut Chip8Vm, budget: usize) -> Chip8Result<()> {
    let mut executed = 0;
    let mut warned = false;

    while executed < budget {
        match vm.poll()? {
            Flow::Interrupt => break,
            Flow::Idle => thread::yield_now(),
            Flow::KeyWait => {
                if !warned {
                    warn!("program is waiting for a key press");
                    warned = true;
                }
                executed += 1;
            }
            _ => executed += 1,
        }
    }

    Ok(())
}

fn run_disassembler(filepath: &str) -> Result<(), AppError> {
    info!("running disassembler");

    let bytecode = fs::read(filepath)?;
    Disassembler::new(bytecode.as_slice()).print_bytecode()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_bytecode(&filepath, config.as_deref())?,
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;

    // don't format me T.T
    match cmd.as_str() {
        "run" => Some(Cmd::Run {
            filepath: args.next()?,
            config: args.next(),
        }),
        "dis" => Some(Cmd::Dis {
            filepath: args.next()?,
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Disassemble
    Dis { filepath: String },
}
