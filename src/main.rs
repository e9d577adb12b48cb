//! CLI entry point (spec.md §6, §4.8): iterates the base names given on
//! the command line and assembles each independently.

use std::process::ExitCode;

use asmc::diag::ConsoleDiagnostics;

fn main() -> ExitCode {
    env_logger::init();

    let bases: Vec<String> = std::env::args().skip(1).collect();
    if bases.is_empty() {
        eprintln!("usage: asmc <file>...  (each <file> is read as <file>.as)");
        return ExitCode::SUCCESS;
    }

    let mut diag = ConsoleDiagnostics::new();
    for base in &bases {
        log::info!("assembling {base}.as");
        if let Err(fatal) = asmc::assemble_file(base, &mut diag) {
            eprintln!("{base}: {fatal}");
            log::error!("{base}: {fatal}");
            return ExitCode::from(fatal.exit_code() as u8);
        }
    }
    ExitCode::SUCCESS
}
