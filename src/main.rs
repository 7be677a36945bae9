use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uxnbus::device::DATETIME_PORT;
use uxnbus::host::Host;
use uxnbus::inspect::{hex_grid, port_table};
use uxnbus::{Machine, MachineConfig, PAGE_PROGRAM};

#[derive(Parser)]
#[command(name = "uxnbus", about = "Device bus and execution controls for a small stack machine")]
struct Cli {
    /// Do not echo log lines to stderr.
    #[arg(long, global = true)]
    quiet: bool,

    /// Disable colored log output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the ports of a freshly booted machine.
    Devices,
    /// Boot, load a ROM and dump memory and the working stack.
    Load {
        rom: PathBuf,
        /// First memory address to show (hex).
        #[arg(long, default_value = "100", value_parser = parse_hex)]
        offset: u16,
        /// Number of 16-byte memory rows to show.
        #[arg(long, default_value_t = 8)]
        rows: usize,
    },
    /// Read the datetime port through the bus.
    Clock,
}

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches('#');
    u16::from_str_radix(digits, 16).map_err(|e| format!("Invalid address '{s}': {e}"))
}

fn main() {
    let cli = Cli::parse();
    let config = MachineConfig {
        echo_log: !cli.quiet,
        color: !cli.no_color,
        ..MachineConfig::default()
    };
    let mut machine = match Machine::new(config, Host::system()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Devices => print!("{}", port_table(machine.bus())),
        Command::Load { rom, offset, rows } => {
            let n = match machine.load(&rom) {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            };
            println!("{n} bytes at #{PAGE_PROGRAM:04X}");
            println!("Memory:");
            print!(
                "{}",
                hex_grid(
                    machine.memory().as_slice(),
                    offset as usize,
                    16,
                    rows,
                    Some(machine.program_pointer() as usize)
                )
            );
            println!("Working stack:");
            print!(
                "{}",
                hex_grid(
                    machine.wst().data(),
                    0,
                    16,
                    16,
                    Some(machine.wst().ptr() as usize)
                )
            );
        }
        Command::Clock => {
            let registers: Vec<u8> = (0..0x10).map(|sub| machine.device_read(DATETIME_PORT, sub)).collect();
            let t = machine.bus().datetime_registers();
            println!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02} weekday={} yearday={} dst={}",
                t.year,
                t.month + 1,
                t.day,
                t.hour,
                t.minute,
                t.second,
                t.weekday,
                t.yearday,
                t.dst
            );
            let hex: Vec<String> = registers.iter().map(|b| format!("{b:02x}")).collect();
            println!("registers: {}", hex.join(" "));
        }
    }
}
