//! vcpu - CLI Entry Point
//!
//! Commands:
//! - `vcpu run` - Run the built-in demo program and print the results
//! - `vcpu trace` - Run the demo and list every fetched instruction
//! - `vcpu disasm` - Disassemble the demo program

use clap::{Parser, Subcommand, Args};
use log::{LevelFilter, Metadata, Record};

use vcpu::{demo, ConfigError, Cpu, CpuConfig, CpuError, Tracer};

/// Exit status when the program hits an unexecutable instruction.
const FAULT_EXIT_CODE: i32 = 1;

/// Exit status for configuration and setup errors.
const SETUP_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "vcpu")]
#[command(version)]
#[command(about = "A minimal 32-bit register virtual CPU")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv per-instruction trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo program until it halts or faults
    Run {
        #[command(flatten)]
        machine: MachineArgs,
        /// Stop after this many instructions
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the demo program and print a trace of every fetch
    Trace {
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Disassemble the demo program
    Disasm,
}

#[derive(Args)]
struct MachineArgs {
    /// JSON file with `registers` and `memory_size`
    #[arg(short, long)]
    config: Option<String>,
    /// Number of memory words
    #[arg(short, long)]
    memory_size: Option<usize>,
    /// Number of registers
    #[arg(short, long)]
    registers: Option<usize>,
}

impl MachineArgs {
    fn to_config(&self) -> Result<CpuConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CpuConfig::from_json_file(path)?,
            None => CpuConfig::default(),
        };
        if let Some(size) = self.memory_size {
            config.memory_size = size;
        }
        if let Some(count) = self.registers {
            config.registers = count;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Some(Commands::Run { machine, max_cycles, json }) => {
            run_demo(&machine, max_cycles, json);
        }
        Some(Commands::Trace { machine }) => {
            trace_demo(&machine);
        }
        Some(Commands::Disasm) => {
            disassemble_demo();
        }
        None => {
            run_demo(&MachineArgs { config: None, memory_size: None, registers: None }, None, false);
        }
    }
}

/// Build a CPU with the demo program loaded, or exit on a setup error.
fn setup<T: Tracer>(machine: &MachineArgs, tracer: T) -> Cpu<T> {
    let config = match machine.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(SETUP_EXIT_CODE);
        }
    };

    let mut cpu = Cpu::with_tracer(config, tracer);
    if let Err(e) = demo::load(&mut cpu.mem) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(SETUP_EXIT_CODE);
    }
    cpu
}

fn run_demo(machine: &MachineArgs, max_cycles: Option<u64>, json: bool) {
    let mut cpu = setup(machine, vcpu::LogTracer);

    let result = match max_cycles {
        Some(limit) => cpu.run_limited(limit),
        None => cpu.run(),
    };

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    } else {
        println!("━━━ Result ━━━");
        println!("Cycles: {}", cpu.cycles());
        println!("State:  {:?}", cpu.state());
        println!("Register r1: {}", cpu.regs.get(1));
        println!("Register r2: {}", cpu.regs.get(2));
        println!("[{}]: {}", demo::OUTPUT_ADDR, cpu.mem.get(demo::OUTPUT_ADDR));
    }

    exit_on_fault(result);
}

fn trace_demo(machine: &MachineArgs) {
    let mut cpu = setup(machine, Vec::<vcpu::TraceRecord>::new());
    let result = cpu.run();

    for record in cpu.tracer() {
        println!("{}", record);
    }

    exit_on_fault(result);
}

fn disassemble_demo() {
    for (addr, instr) in demo::PROGRAM {
        println!("{:04}: {:08X}  {}", addr, instr.encode(), instr);
    }
}

fn exit_on_fault(result: Result<u64, CpuError>) {
    if let Err(fault) = result {
        eprintln!("{}", fault_message(&fault));
        std::process::exit(FAULT_EXIT_CODE);
    }
}

fn fault_message(fault: &CpuError) -> String {
    format!("❌ {}", fault)
}

/// Minimal stderr backend for the `log` facade.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_message_names_opcode_once() {
        let msg = fault_message(&CpuError::UnknownOpcode { raw: 0x00, pc: 5 });
        assert_eq!(msg, "❌ fault at pc=5: unknown opcode 0x00");
        assert_eq!(msg.matches("opcode").count(), 1);
    }
}
