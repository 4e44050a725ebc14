use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser as CliParser, Subcommand};
use tracing_subscriber::EnvFilter;

use windlang::ast::Program;
use windlang::bytecode;
use windlang::compiler::Compiler;
use windlang::interpreter::Evaluator;
use windlang::lexer::Lexer;
use windlang::parser::Parser;
use windlang::vm::Vm;

#[derive(CliParser)]
#[command(name = "wind", about = "The Wind scripting language", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Wind script with the tree-walking evaluator
    Run { script: PathBuf },
    /// Run a Wind script with the bytecode compiler and VM
    Vm {
        script: PathBuf,
        /// Print the disassembled program before executing it
        #[arg(short, long)]
        debug: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { script } => run(&script),
        Command::Vm { script, debug } => run_vm(&script, debug),
    }
}

/// Lex and parse a script. Any parse error is fatal: every accumulated error
/// is printed and the process exits with status 1.
fn parse_file(script: &Path) -> anyhow::Result<(Program, String)> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("could not read file {}", script.display()))?;
    let file_path = script.to_string_lossy().into_owned();

    let mut parser = Parser::new(Lexer::new(&source), file_path.clone());
    let program = parser.parse_program();

    let errors = parser.report_errors();
    if !errors.is_empty() {
        for error in errors {
            println!("{error}");
        }
        process::exit(1);
    }

    Ok((program, file_path))
}

fn run(script: &Path) -> anyhow::Result<()> {
    let (program, file_path) = parse_file(script)?;

    let mut evaluator = Evaluator::new(file_path);
    if let Err(error) = evaluator.run(&program) {
        println!("{error}");
        process::exit(1);
    }

    Ok(())
}

fn run_vm(script: &Path, debug: bool) -> anyhow::Result<()> {
    let (program, file_path) = parse_file(script)?;

    let mut compiler = Compiler::new(file_path);
    let instructions = match compiler.compile(&program) {
        Ok(instructions) => instructions,
        Err(error) => {
            println!("{error}");
            process::exit(1);
        }
    };

    if debug {
        print!("{}", bytecode::disassemble(&instructions));
    }

    let num_locals = compiler.main_locals();
    let mut vm = Vm::new(instructions, num_locals, compiler.constants);
    if let Err(error) = vm.run() {
        println!("{error}");
        process::exit(1);
    }

    Ok(())
}
