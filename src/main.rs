#![forbid(unsafe_code)]

//! sguard — replay suite scripts under suite_guard's failure policies.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    match cli_app::run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("sguard: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
