use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use jitwalk_core::jit::LineTableEntry;
use jitwalk_core::prelude::*;
use jitwalk_utils::{LogFormat, LogLevel, LoggingConfig, info, init_logging};
use regex::Regex;

/// Symbolicate and unwind JIT-compiled Java frames from a stopped-process snapshot.
#[derive(Parser, Debug)]
#[command(name = "jitwalk")]
#[command(version)]
#[command(about = "Symbolicate and unwind JIT-compiled Java frames from a stopped-process snapshot", long_about = None)]
struct Cli
{
    /// Snapshot of the stopped process (JSON)
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Maximum number of frames in a backtrace
    #[arg(long, default_value_t = jitwalk_core::session::DEFAULT_MAX_FRAMES)]
    max_frames: usize,

    /// Module (path suffix) containing the return-to-interpreter trampolines
    #[arg(long)]
    helper_module: Option<String>,

    /// Log level (overrides RUST_LOG)
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Log format: pretty or json (overrides JITWALK_LOG_FORMAT)
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List compiled methods containing a PC or matching a name pattern
    Methods
    {
        /// PC (hex 0x... or decimal) or regular expression; defaults to the current PC
        target: Option<String>,
    },
    /// Unwind one frame and show the caller's registers
    Unwind
    {
        /// Frame number, 0 being the innermost
        #[arg(default_value_t = 0)]
        frame: usize,
    },
    /// Walk the stack from the current registers
    Backtrace,
    /// Show the PC to line table of methods matching a name pattern
    Lines
    {
        /// Regular expression matched against `Class.method(signature)`
        pattern: String,
    },
    /// Dump the instruction stream of every compile event
    Instructions,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String>
{
    value.parse().map_err(|err: jitwalk_utils::LoggingError| err.to_string())
}

fn parse_log_format(value: &str) -> Result<LogFormat, String>
{
    value.parse().map_err(|err: jitwalk_utils::LoggingError| err.to_string())
}

fn main()
{
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    logging.level = cli.log_level;
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    let _guard = match init_logging(&logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> JitResult<()>
{
    let mut abi = TargetAbi::riscv64();
    if let Some(module) = cli.helper_module {
        abi.helper_module = module;
    }
    let config = SessionConfig {
        max_frames: cli.max_frames,
        abi,
    };

    info!("Loading snapshot {}", cli.snapshot.display());
    let snapshot = Snapshot::load(&cli.snapshot)?;
    let session = JitSession::from_snapshot(snapshot, config)?;
    let registers = session.memory().registers().clone();

    match cli.command {
        Commands::Methods { target } => list_methods(&session, &registers, target.as_deref()),
        Commands::Unwind { frame } => {
            print_unwind(&session, &registers, frame);
            Ok(())
        }
        Commands::Backtrace => {
            for frame in session.backtrace(&registers) {
                print_frame(&frame);
            }
            Ok(())
        }
        Commands::Lines { pattern } => print_lines(&session, &compile_pattern(&pattern)?),
        Commands::Instructions => {
            print_instructions(session.memory().compile_events());
            Ok(())
        }
    }
}

type SnapshotSession = JitSession<Snapshot, SymbolTable>;

fn compile_pattern(pattern: &str) -> JitResult<Regex>
{
    Regex::new(pattern).map_err(|err| JitError::InvalidArgument(format!("invalid pattern {pattern:?}: {err}")))
}

/// `0x...` is hex, plain digits are decimal, anything else is not a PC.
fn parse_pc(text: &str) -> Option<Address>
{
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => text.parse().ok()?,
    };
    Some(Address::from(value))
}

fn list_methods(session: &SnapshotSession, registers: &Registers, target: Option<&str>) -> JitResult<()>
{
    let methods = match target {
        None => session.method_at(registers.pc).into_iter().collect(),
        Some(text) => match parse_pc(text) {
            Some(pc) => session.method_at(pc).into_iter().collect(),
            None => session.methods_matching(&compile_pattern(text)?),
        },
    };

    if methods.is_empty() {
        println!("No method found.");
    }
    for method in methods {
        println!("{method}");
    }
    Ok(())
}

fn print_unwind(session: &SnapshotSession, registers: &Registers, frame: usize)
{
    let Some(unwind_info) = session.unwind_frame(registers, frame) else {
        println!("No unwinder succeeded");
        return;
    };
    println!("{unwind_info}");
    for saved in &unwind_info.saved_registers {
        println!("  {:<4} 0x{:016x}", saved.register.abi_name(), saved.value);
    }
}

fn print_frame(frame: &StackFrame)
{
    println!("{frame}");
    if let Some(cfa) = frame.cfa {
        print!("     cfa {cfa}");
        if let Some(return_address) = frame.return_address {
            print!(" ra {return_address}");
        }
        println!();
    }
}

fn print_lines(session: &SnapshotSession, pattern: &Regex) -> JitResult<()>
{
    let methods = session.methods_matching(pattern);
    if methods.is_empty() {
        println!("No method found.");
    }
    for method in methods {
        println!("{method} ({})", method.source_file());
        match method.full_line_table() {
            Ok(entries) => entries.iter().for_each(print_line_entry),
            Err(err) if err.is_not_found() => println!("  no line information"),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn print_line_entry(entry: &LineTableEntry)
{
    let mut flags = Vec::new();
    if entry.is_statement {
        flags.push("stmt");
    }
    if entry.is_prologue_end {
        flags.push("prologue_end");
    }
    println!("  {}  line {:<5} {}", entry.pc, entry.line, flags.join(" "));
}

fn print_instructions(events: &[CompileEvent])
{
    for event in events {
        println!(
            "0x{:x} - 0x{:x} ({} instructions)",
            event.metadata.start_pc,
            event.metadata.end_pc,
            event.instructions.len()
        );
        for instruction in &event.instructions {
            let marker = if instruction.is_pseudo() { " (pseudo)" } else { "" };
            println!(
                "  {}  len {:>2}  bci {:>4}{marker}",
                instruction.pc, instruction.length, instruction.bytecode_index
            );
        }
    }
}
