use std::process;

use clap::Parser;

use grokdebug::cli::Args;

fn main() {
    let args = Args::parse();
    grokdebug::init_tracing(args.debug);
    match grokdebug::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(3);
        }
    }
}
