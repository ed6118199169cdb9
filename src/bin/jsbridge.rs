//! CLI wrapper around a jsbridge runtime.
//!
//! Usage:
//!   jsbridge <file.js>              # Execute a JavaScript file
//!   jsbridge -e "code"              # Evaluate JavaScript code
//!   jsbridge                        # Start REPL (interactive mode)
//!
//! The runtime is configured from `JSBRIDGE_CONFIG` and `JSBRIDGE_PATH`;
//! logging is controlled with `RUST_LOG`.

use jsbridge::bridge::{HostFn, HostValue, Runtime};
use jsbridge::config::RuntimeConfig;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => {
            // No arguments: start REPL
            run_repl();
        }
        2 => {
            let arg = &args[1];
            if arg == "-h" || arg == "--help" {
                print_usage();
                process::exit(0);
            }
            run_file(arg);
        }
        3 if args[1] == "-e" || args[1] == "--eval" => {
            eval_code(&args[2]);
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("jsbridge - JavaScript runtime with host object bridging");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  jsbridge <file.js>              Execute a JavaScript file");
    eprintln!("  jsbridge -e \"code\"              Evaluate JavaScript code");
    eprintln!("  jsbridge --eval \"code\"          Evaluate JavaScript code");
    eprintln!("  jsbridge                        Start REPL (interactive mode)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  JSBRIDGE_CONFIG                 Configuration file");
    eprintln!("  JSBRIDGE_PATH                   Extra module search path entries");
}

/// Builds the runtime, exiting on configuration errors.
fn create_runtime() -> Runtime {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    let runtime = match Runtime::with_config(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Cannot start runtime: {}", e);
            process::exit(1);
        }
    };
    let print = HostFn::new(|_frame, args| {
        let line: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        println!("{}", line.join(" "));
        Ok(HostValue::Undefined)
    });
    if let Err(e) = runtime.set("print", print) {
        eprintln!("Cannot install print: {}", e);
        process::exit(1);
    }
    runtime
}

fn run_file(filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let runtime = create_runtime();
    // Modules next to the script resolve without extra configuration.
    if let Some(dir) = Path::new(filename).parent() {
        runtime.add_search_path(dir);
    }
    if let Err(e) = runtime.evaluate(&source) {
        eprintln!("Uncaught {}", e);
        process::exit(1);
    }
}

fn eval_code(code: &str) {
    let runtime = create_runtime();
    match runtime.evaluate(code) {
        Ok(value) => {
            if !value.is_undefined() {
                println!("{}", value);
            }
        }
        Err(e) => {
            eprintln!("Uncaught {}", e);
            process::exit(1);
        }
    }
}

fn run_repl() {
    println!("jsbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("Type JavaScript code and press Enter. Type .exit to quit.");
    println!();

    let runtime = create_runtime();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        if let Err(e) = stdout.flush() {
            eprintln!("Error writing prompt: {}", e);
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }

        let input = input.trim();
        match input {
            ".exit" | ".quit" => break,
            ".gc" => {
                match runtime.collect_garbage() {
                    Ok(removed) => println!("{:?} ({} entries reclaimed)", runtime.stats(), removed),
                    Err(e) => eprintln!("{}", e),
                }
                continue;
            }
            "" => continue,
            _ => {}
        }

        match runtime.evaluate(input) {
            Ok(value) => {
                if !value.is_undefined() {
                    println!("{}", value);
                }
            }
            Err(e) => eprintln!("Uncaught {}", e),
        }
    }

    println!("Goodbye!");
}
