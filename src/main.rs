//! Mano Simulator - CLI Entry Point
//!
//! Commands:
//! - `mano-sim asm <source>` - Assemble and print a listing
//! - `mano-sim run <source>` - Assemble, load and run until HLT
//! - `mano-sim disasm <source>` - Disassemble the loaded memory image

use clap::{Parser, Subcommand};
use mano::asm::{assemble_with, disassemble_memory, disassemble_word, Assembler};
use mano::cpu::Simulator;
use mano::event::{EventLog, EventSink, LogSink};

#[derive(Parser)]
#[command(name = "mano-sim")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An assembler and T-state simulator for the Mano basic computer")]
struct Cli {
    /// Sets the level of verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file and print the listing
    Asm {
        /// Path to the source file
        source: String,
        /// Also print the symbol table
        #[arg(short, long)]
        symbols: bool,
    },
    /// Run a program until it halts
    Run {
        /// Path to the source file to execute
        source: String,
        /// Text fed to the input queue, one byte per character
        #[arg(short, long)]
        input: Option<String>,
        /// Maximum number of micro-steps to run
        #[arg(short, long, default_value = "100000")]
        max_steps: u64,
        /// Print every trace event as it is emitted
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assemble a source file and disassemble the memory image
    Disasm {
        /// Path to the source file
        source: String,
    },
}

fn main() {
    let cli = Cli::parse();
    initialize_logging(cli.verbose);

    match cli.command {
        Some(Commands::Asm { source, symbols }) => {
            assemble_file(&source, symbols);
        }
        Some(Commands::Run { source, input, max_steps, trace, json }) => {
            run_program(&source, input, max_steps, trace, json);
        }
        Some(Commands::Disasm { source }) => {
            disassemble_file(&source);
        }
        None => {
            println!("Mano Simulator v0.1.0");
            println!("An assembler and simulator for the Mano basic computer");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn initialize_logging(verbosity: u8) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(match verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .chain(std::io::stderr())
        .apply()
        .ok();
}

fn read_source(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    }
}

fn assemble_file(path: &str, show_symbols: bool) {
    let source = read_source(path);

    println!("📝 Assembling: {}", path);

    let mut assembler = Assembler::new();
    let program = match assembler.assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "✓ Assembled {} instructions, {} data words",
        program.instructions.len(),
        program.data.len()
    );
    println!();

    for instr in &program.instructions {
        println!(
            "{:03X}: {:04X}  {:<12} ; {:>4}: {}",
            instr.origin,
            instr.binary,
            disassemble_word(instr.binary),
            instr.source_line_number,
            instr.source_line
        );
    }
    for data in &program.data {
        println!("{:03X}: {:04X}  DATA", data.origin, data.binary);
    }

    if show_symbols {
        println!();
        println!("━━━ Symbols ━━━");
        for (label, addr) in assembler.symbols() {
            println!("{:<12} {:03X}", label, addr);
        }
    }
}

fn run_program(path: &str, input: Option<String>, max_steps: u64, trace: bool, json: bool) {
    let source = read_source(path);

    println!("🔧 Running: {}", path);

    if trace {
        let mut log = EventLog::new();
        log.subscribe(|entry| println!("{}", entry));
        execute(Simulator::with_sink(log), &source, input, max_steps, json);
    } else {
        execute(Simulator::with_sink(LogSink), &source, input, max_steps, json);
    }
}

fn execute<S: EventSink>(mut sim: Simulator<S>, source: &str, input: Option<String>, max_steps: u64, json: bool) {
    let program = match assemble_with(source, sim.sink_mut()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sim.load(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    if let Some(text) = input {
        sim.set_input_stream(text.into_bytes());
    }

    println!();
    println!("━━━ Execution ━━━");

    let steps = match sim.run_limited(max_steps) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("❌ CPU error at PC={:03X}: {}", sim.registers().pc(), e);
            std::process::exit(1);
        }
    };

    let snap = sim.snapshot();

    if json {
        match serde_json::to_string_pretty(&snap) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Micro-steps:  {}", steps);
    println!("Instructions: {}", sim.instructions());
    println!("Output:       {:?}", snap.output_text());
    println!("{:?}", sim.registers());
    println!(
        "E={} S={} IEN={} FGI={} FGO={}",
        snap.e as u8, snap.s as u8, snap.ien as u8, snap.fgi as u8, snap.fgo as u8
    );

    if !sim.is_halted() {
        println!();
        println!("⚠️  Reached max steps limit ({}). Use --max-steps to increase.", max_steps);
    }
}

fn disassemble_file(path: &str) {
    let source = read_source(path);

    println!("📖 Disassembling: {}", path);
    println!();

    let mut sim = Simulator::with_sink(LogSink);
    let loaded = assemble_with(&source, sim.sink_mut())
        .map_err(|e| e.to_string())
        .and_then(|program| sim.load(&program).map_err(|e| e.to_string()));
    if let Err(e) = loaded {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    println!("{}", disassemble_memory(sim.memory()));
}
