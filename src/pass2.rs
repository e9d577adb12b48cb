//! Second pass (spec.md §4.6): re-walks the same source lines against
//! the provisional code image built by [`crate::pass1`], resolving
//! every symbol-dependent operand, flagging `.entry` symbols, and
//! recording external references.

use crate::diag::{AssemblyError, AssemblyWarning, Diagnostics};
use crate::isa::{self, Directive, Operand};
use crate::pass1::split_label;
use crate::symbol::SymbolTable;
use crate::tokenize::{is_comment, tokenize};
use crate::word::{to_s21, Are, CodeImage, ExternalRefs, Word, INITIAL_LOAD_ADDR};

/// Runs the second pass. `pass1_had_errors` gates mutation: when pass 1
/// already failed, pass 2 still runs (so pass-2-only errors such as an
/// undefined symbol are also reported) but leaves the code image,
/// externals list, and entry flags untouched, since none of the three
/// output files will be emitted for this input (spec.md §4.6, §7).
///
/// Returns `true` iff this pass reported at least one assembly error.
pub fn second_pass(
    lines: &[String],
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    code: &mut CodeImage,
    externals: &mut ExternalRefs,
    pass1_had_errors: bool,
) -> bool {
    let mut had_errors = false;
    let mut ic = INITIAL_LOAD_ADDR;
    let mut cursor = 0usize;
    let mutate = !pass1_had_errors;

    for (idx, raw) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if is_comment(raw) {
            continue;
        }
        let tokens = tokenize(raw);
        if tokens.is_empty() {
            continue;
        }

        let (label, rest) = split_label(&tokens);
        if rest.is_empty() {
            continue;
        }
        let Some(key) = rest[0].text() else { continue };
        let operand_texts: Vec<&str> = rest[1..].iter().filter_map(|t| t.text()).collect();

        if let Some(directive_name) = key.strip_prefix('.') {
            if isa::classify_directive(directive_name) == Directive::Entry {
                handle_entry(&operand_texts, label.as_deref(), line_no, diag, symtab, mutate, &mut had_errors);
            }
            continue;
        }

        let Some(descr) = isa::find_instruction(key) else { continue };
        let instruction_start = ic;
        cursor += 1;
        ic += 1;

        let operands: Vec<Operand> = operand_texts.iter().map(|t| isa::classify_operand(t)).collect();
        let count = descr.operand_count as usize;

        for op in operands.into_iter().take(count) {
            match op {
                Operand::Register(_) => {}
                Operand::Immediate(_) => {
                    cursor += 1;
                    ic += 1;
                }
                Operand::Direct(name) => {
                    match symtab.lookup(&name) {
                        None => {
                            had_errors = true;
                            diag.error(AssemblyError::UnknownSymbol { line: line_no, name: name.clone() });
                        }
                        Some(sym) => {
                            let word = sym.replacement_word();
                            let external = sym.external;
                            if mutate {
                                code.set(cursor, word);
                                if external {
                                    externals.push(name.clone(), ic);
                                }
                            }
                        }
                    }
                    cursor += 1;
                    ic += 1;
                }
                Operand::Relative(name) => {
                    match symtab.lookup(&name) {
                        None => {
                            had_errors = true;
                            diag.error(AssemblyError::UnknownSymbol { line: line_no, name: name.clone() });
                        }
                        Some(sym) if sym.external => {
                            had_errors = true;
                            diag.error(AssemblyError::RelativeToExternalSymbol {
                                line: line_no,
                                name: name.clone(),
                            });
                        }
                        Some(sym) => {
                            let offset = to_s21(sym.address - instruction_start);
                            if mutate {
                                code.set(cursor, Word::payload21(Are::Absolute, offset));
                            }
                        }
                    }
                    cursor += 1;
                    ic += 1;
                }
            }
        }
    }

    had_errors
}

fn handle_entry(
    operand_texts: &[&str],
    label: Option<&str>,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    mutate: bool,
    had_errors: &mut bool,
) {
    if label.is_some() {
        diag.warning(AssemblyWarning::LabelOnEntry { line: line_no });
    }
    let Some(&name) = operand_texts.first() else {
        *had_errors = true;
        diag.error(AssemblyError::ExtraneousTokens { line: line_no });
        return;
    };
    match symtab.lookup(name) {
        None => {
            *had_errors = true;
            diag.error(AssemblyError::UnknownSymbol { line: line_no, name: name.to_string() });
        }
        Some(sym) if sym.external => {
            *had_errors = true;
            diag.error(AssemblyError::EntryOfExternalSymbol { line: line_no, name: name.to_string() });
        }
        Some(_) => {
            if mutate {
                symtab.mark_entry(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::VecDiagnostics;
    use crate::pass1::first_pass;
    use crate::symbol::SymbolTable;
    use crate::word::{format_word_hex, CodeImage, DataImage};

    fn run(src: &str) -> (bool, SymbolTable, CodeImage, ExternalRefs, VecDiagnostics) {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        let mut diag = VecDiagnostics::new();
        let mut symtab = SymbolTable::new();
        let mut code = CodeImage::new();
        let mut data = DataImage::new();
        let p1_errs = first_pass(&lines, &mut diag, &mut symtab, &mut code, &mut data);
        let mut externals = ExternalRefs::new();
        let p2_errs = second_pass(&lines, &mut diag, &mut symtab, &mut code, &mut externals, p1_errs);
        (p1_errs || p2_errs, symtab, code, externals, diag)
    }

    #[test]
    fn external_direct_reference_recorded() {
        let (had_errors, _symtab, code, externals, diag) = run(".extern X\njmp X");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(code.get(1).are(), crate::word::Are::External as u32);
        let refs: Vec<_> = externals.iter().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "X");
        assert_eq!(refs[0].address, 101);
    }

    #[test]
    fn entry_flag_applied_after_resolution() {
        let (had_errors, symtab, _code, _externals, diag) = run(".entry L\nL: .data 5\nstop");
        assert!(!had_errors, "{:?}", diag.errors);
        assert!(symtab.lookup("L").unwrap().entry);
    }

    #[test]
    fn entry_of_external_is_an_error() {
        let (had_errors, _symtab, _code, _externals, diag) = run(".extern X\n.entry X\njmp X");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::EntryOfExternalSymbol { .. })));
    }

    #[test]
    fn relative_to_undefined_label_is_an_error() {
        let (had_errors, _symtab, _code, _externals, diag) = run("jmp &NOPE\nstop");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::UnknownSymbol { .. })));
    }

    #[test]
    fn relative_to_external_is_rejected() {
        let (had_errors, _symtab, _code, _externals, diag) = run(".extern X\njmp &X\nstop");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::RelativeToExternalSymbol { .. })));
    }

    #[test]
    fn relative_self_reference_zero_offset() {
        let (had_errors, _symtab, code, _externals, diag) = run("HERE: jmp &HERE\nstop");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(format_word_hex(code.get(1)), "000004");
    }

    #[test]
    fn direct_operand_to_data_symbol_resolves_after_shift() {
        let (had_errors, symtab, code, _externals, diag) = run("lea L, r0\nstop\nL: .data 9");
        assert!(!had_errors, "{:?}", diag.errors);
        let l_addr = symtab.lookup("L").unwrap().address;
        assert_eq!(l_addr, 103);
        assert_eq!(code.get(1).payload(), l_addr as u32);
    }
}
