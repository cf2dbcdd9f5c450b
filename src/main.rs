//! earlyad binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match early_adopter::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
