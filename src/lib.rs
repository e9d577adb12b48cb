//! Two-pass assembler core (spec.md §1-§4): lexing, symbol-table
//! construction, instruction encoding, and emission of `.ob`/`.ext`/`.ent`
//! artifacts for a custom assembly language.
//!
//! The library exposes the pipeline as a function of in-memory lines
//! ([`assemble_lines`]) so it is fully testable without a filesystem;
//! [`assemble_file`] is the thin, filesystem-aware wrapper the binary
//! driver uses per input base name.

pub mod diag;
pub mod emitter;
pub mod isa;
pub mod line;
pub mod pass1;
pub mod pass2;
pub mod symbol;
pub mod tokenize;
pub mod word;

use diag::{Diagnostics, FatalError};
use emitter::FileOutputSink;
use line::{materialize, FileLineSource};
use symbol::SymbolTable;
use word::{CodeImage, DataImage, ExternalRefs};

/// Everything produced by a successful run of both passes over one
/// input: the images the emitter formats, and the symbol table it
/// reads entry flags and data-symbol addresses from.
pub struct Assembly {
    pub code: CodeImage,
    pub data: DataImage,
    pub externals: ExternalRefs,
    pub symtab: SymbolTable,
}

/// Runs both passes over already-materialized source lines. Returns
/// `None` if either pass reported an assembly error, per spec.md §7's
/// "presence of any error in either pass suppresses emission of all
/// three output files".
pub fn assemble_lines(lines: &[String], diag: &mut dyn Diagnostics) -> Option<Assembly> {
    let mut symtab = SymbolTable::new();
    let mut code = CodeImage::new();
    let mut data = DataImage::new();
    let pass1_had_errors = pass1::first_pass(lines, diag, &mut symtab, &mut code, &mut data);

    let mut externals = ExternalRefs::new();
    let pass2_had_errors =
        pass2::second_pass(lines, diag, &mut symtab, &mut code, &mut externals, pass1_had_errors);

    if pass1_had_errors || pass2_had_errors {
        None
    } else {
        Some(Assembly { code, data, externals, symtab })
    }
}

/// Convenience wrapper over [`assemble_lines`] for tests that hold
/// source as a single string.
pub fn assemble_source(text: &str, diag: &mut dyn Diagnostics) -> Option<Assembly> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    assemble_lines(&lines, diag)
}

/// Drives one input base name end to end: reads `<base>.as`, runs both
/// passes, and — only if materializing the source reported no error
/// (a too-long line, in particular) and neither pass reported one —
/// writes `<base>.ob` (always), `<base>.ext` (iff non-empty), `<base>.ent`
/// (iff non-empty), per spec.md §4.8 and §7.1's "an assembly error
/// anywhere in the input suppresses emission of all three files".
///
/// A missing or unreadable input file is reported as an assembly-level
/// error (this input is skipped, the process continues to the next
/// base name) rather than treated as fatal; see `DESIGN.md`. Failure to
/// read an already-open input, or to create, write, or close an output
/// file, is fatal and ends the process (spec.md §7.3, §6).
pub fn assemble_file(base: &str, diag: &mut dyn Diagnostics) -> Result<(), FatalError> {
    diag.set_current_file(&format!("{base}.as"));

    let mut source = match FileLineSource::open(&format!("{base}.as")) {
        Ok(source) => source,
        Err(_) => {
            diag.error(diag::AssemblyError::CannotOpenInput { name: format!("{base}.as") });
            return Ok(());
        }
    };
    let lines = materialize(&mut source, diag)?;
    let had_line_errors = diag.had_errors();

    let Some(assembly) = assemble_lines(&lines, diag) else {
        return Ok(());
    };

    if had_line_errors {
        return Ok(());
    }

    let mut sink = FileOutputSink::new(base);
    emitter::emit(&mut sink, &assembly.code, &assembly.data, &assembly.externals, &assembly.symtab)
}
