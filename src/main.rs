use std::{
    cell::RefCell,
    io::{BufRead, Write},
    rc::Rc,
};

use clap::{Args, Parser, Subcommand};
use make_lang::{
    tokenizer::{TokenType, TokenizeError, Tokenizer},
    tree_walk_interpreter::{InterpretError, Interpreter},
};

#[derive(Debug, Parser)]
#[command(version, about = "Interpreter for a small dynamically typed scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a source file
    Run(RunArgs),
    /// Start an interactive session (default)
    Repl,
    /// Print the token stream of a source file
    Tokens(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: String,
}

fn main() {
    let args = Cli::parse();

    match args.command() {
        Command::Repl => {
            repl_command();
        }
        Command::Run(args) => {
            run_command(args);
        }
        Command::Tokens(args) => {
            tokens_command(args);
        }
    }
}

fn repl_command() {
    println!("Welcome to the make-lang REPL!");
    println!("Type `exit` or EOF to quit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    // The REPL and `input(...)` read from the same locked stdin.
    let stdin = Rc::new(RefCell::new(std::io::stdin().lock()));
    let mut interpreter = Interpreter::new(Rc::new(RefCell::new(std::io::stdout())), stdin.clone());
    let mut input = String::new();

    loop {
        print!("> ");
        std::io::stdout()
            .flush()
            .expect("should be able to flush stdout");

        input.clear();
        let read = stdin
            .borrow_mut()
            .read_line(&mut input)
            .expect("should be able to read line from stdin");

        if read == 0 {
            println!();
            break;
        }

        let source = input.trim();
        if source == "exit" {
            break;
        }
        if source.is_empty() {
            continue;
        }

        match interpreter.run(source) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => {}
            Err(e) => report(&e),
        }
    }
}

fn run_command(args: &RunArgs) {
    let source = std::fs::read_to_string(&args.file).expect("should be able to read source file");
    let mut interpreter = Interpreter::default();
    if let Err(e) = interpreter.run(&source) {
        report(&e);
        std::process::exit(1);
    }
}

fn tokens_command(args: &RunArgs) {
    let source = std::fs::read_to_string(&args.file).expect("should be able to read source file");
    if let Err(e) = dump_tokens(&source) {
        eprintln!("Lexical error: {e}");
        std::process::exit(1);
    }
}

fn report(error: &InterpretError) {
    eprintln!("Error: {}", error);
}

fn dump_tokens(source: &str) -> Result<(), TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut line = 0;
    loop {
        let token = tokenizer.next_token()?;
        if token.span.line != line {
            print!("{:4} ", token.span.line);
            line = token.span.line;
        } else {
            print!("   | ");
        }

        println!("{:<10} {}", token.kind(), token.token_type);

        if token.token_type == TokenType::Eof {
            break;
        }
    }

    Ok(())
}
