//! First pass (spec.md §4.5): tokenises every line, builds the symbol
//! table, the data image, and a provisional code image in which every
//! symbol-dependent word is a zero placeholder for the second pass to
//! fill in.

use crate::diag::{AssemblyError, AssemblyWarning, Diagnostics};
use crate::isa::{self, parse_signed_decimal, Directive, Operand};
use crate::symbol::SymbolTable;
use crate::tokenize::{is_comment, tokenize, Token};
use crate::word::{self, to_s21, to_s24, Are, CodeImage, DataImage, Word, INITIAL_LOAD_ADDR};

/// Runs the first pass over already-materialized source lines. Returns
/// `true` iff at least one assembly error was reported.
pub fn first_pass(
    lines: &[String],
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    code: &mut CodeImage,
    data: &mut DataImage,
) -> bool {
    let mut had_errors = false;

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
            if label.is_some() {
                diag.warning(AssemblyWarning::LabelOnEmptyLine { line: line_no });
            }
            continue;
        }

        let Some(key) = rest[0].text() else {
            had_errors = true;
            diag.error(AssemblyError::ExtraneousTokens { line: line_no });
            continue;
        };
        let operands = &rest[1..];

        if let Some(directive_name) = key.strip_prefix('.') {
            match isa::classify_directive(directive_name) {
                Directive::Data => {
                    handle_data(operands, label.as_deref(), line_no, diag, symtab, data, &mut had_errors);
                }
                Directive::String => {
                    handle_string(raw, rest[0].end, label.as_deref(), line_no, diag, symtab, data, &mut had_errors);
                }
                Directive::Entry => {
                    if label.is_some() {
                        diag.warning(AssemblyWarning::LabelOnEntry { line: line_no });
                    }
                }
                Directive::Extern => {
                    handle_extern(operands, label.as_deref(), line_no, diag, symtab, &mut had_errors);
                }
                Directive::Unknown => {
                    had_errors = true;
                    diag.error(AssemblyError::UnknownDirective {
                        line: line_no,
                        name: directive_name.to_string(),
                    });
                }
            }
            continue;
        }

        let Some(descr) = isa::find_instruction(key) else {
            had_errors = true;
            diag.error(AssemblyError::UnknownMnemonic { line: line_no, name: key.to_string() });
            continue;
        };

        if let Some(name) = &label {
            install_code_label(name, line_no, diag, symtab, code, &mut had_errors);
        }

        match descr.operand_count {
            0 => {
                if !operands.is_empty() {
                    had_errors = true;
                    diag.error(AssemblyError::ExtraneousTokens { line: line_no });
                }
                let mut w = Word::zero();
                w.set_field(&word::OPCODE, descr.opcode);
                w.set_field(&word::FUNCT, descr.funct);
                code.push(w);
            }
            1 => {
                if operands.len() != 1 || operands[0].is_comma() {
                    had_errors = true;
                    diag.error(AssemblyError::WrongOperandCount { line: line_no, mnemonic: key.to_string() });
                    continue;
                }
                let Some(op) = parse_operand(operands[0].text().unwrap(), line_no, diag, &mut had_errors) else {
                    continue;
                };
                if !isa::allows(descr.dst_modes, op.mode()) {
                    had_errors = true;
                    diag.error(AssemblyError::BadOperandMode { line: line_no, mnemonic: key.to_string() });
                    continue;
                }
                let mut w = Word::zero();
                w.set_field(&word::OPCODE, descr.opcode);
                w.set_field(&word::FUNCT, descr.funct);
                w.set_field(&word::DEST_ADDR, op.mode().encoding());
                if let Operand::Register(r) = &op {
                    w.set_field(&word::DEST_REG, *r as u32);
                }
                code.push(w);
                push_extension_word(&op, code);
            }
            2 => {
                let Some((src_tok, dst_tok)) = split_two_operands(operands, key, line_no, diag, &mut had_errors)
                else {
                    continue;
                };
                let Some(src) = parse_operand(src_tok, line_no, diag, &mut had_errors) else { continue };
                let Some(dst) = parse_operand(dst_tok, line_no, diag, &mut had_errors) else { continue };
                if !isa::allows(descr.src_modes, src.mode()) || !isa::allows(descr.dst_modes, dst.mode()) {
                    had_errors = true;
                    diag.error(AssemblyError::BadOperandMode { line: line_no, mnemonic: key.to_string() });
                    continue;
                }
                let mut w = Word::zero();
                w.set_field(&word::OPCODE, descr.opcode);
                w.set_field(&word::FUNCT, descr.funct);
                w.set_field(&word::SRC_ADDR, src.mode().encoding());
                w.set_field(&word::DEST_ADDR, dst.mode().encoding());
                if let Operand::Register(r) = &src {
                    w.set_field(&word::SRC_REG, *r as u32);
                }
                if let Operand::Register(r) = &dst {
                    w.set_field(&word::DEST_REG, *r as u32);
                }
                code.push(w);
                push_extension_word(&src, code);
                push_extension_word(&dst, code);
            }
            _ => unreachable!("instruction table only defines 0/1/2-operand mnemonics"),
        }
    }

    // Inter-pass shift: every tentative data-symbol address becomes
    // final once the code image's final size is known.
    symtab.shift_data_addresses(code.len() as i64 + INITIAL_LOAD_ADDR);

    had_errors
}

/// Strips a leading `label:` token, if present, returning the label
/// name and the remaining tokens. Shared with the second pass, which
/// re-tokenises the same source independently (spec.md §4.6).
pub(crate) fn split_label(tokens: &[Token]) -> (Option<String>, &[Token]) {
    if let Some(first) = tokens[0].text() {
        if let Some(name) = first.strip_suffix(':') {
            return (Some(name.to_string()), &tokens[1..]);
        }
    }
    (None, tokens)
}

fn install_code_label(
    name: &str,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    code: &CodeImage,
    had_errors: &mut bool,
) {
    if let Err(reason) = isa::validate_symbol_name(name) {
        *had_errors = true;
        diag.error(AssemblyError::InvalidSymbolName {
            line: line_no,
            name: name.to_string(),
            reason: reason.message(),
        });
        return;
    }
    let address = code.len() as i64 + INITIAL_LOAD_ADDR;
    if symtab.install(name, address, false, false, false).is_err() {
        *had_errors = true;
        diag.error(AssemblyError::DuplicateSymbol { line: line_no, name: name.to_string() });
    }
}

/// Classifies one operand token by its leading character and, for
/// immediate operands, parses its integer value. Syntax errors
/// (malformed integer, invalid symbol name) are reported here; mode
/// permission is checked by the caller, which knows the instruction.
fn parse_operand(
    text: &str,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    had_errors: &mut bool,
) -> Option<Operand> {
    if let Some(digits) = text.strip_prefix('#') {
        return match parse_signed_decimal(digits) {
            Some(v) => Some(Operand::Immediate(v)),
            None => {
                *had_errors = true;
                diag.error(AssemblyError::MalformedInteger { line: line_no, text: text.to_string() });
                None
            }
        };
    }
    if let Some(name) = text.strip_prefix('&') {
        return match isa::validate_symbol_name(name) {
            Ok(()) => Some(Operand::Relative(name.to_string())),
            Err(reason) => {
                *had_errors = true;
                diag.error(AssemblyError::InvalidSymbolName {
                    line: line_no,
                    name: name.to_string(),
                    reason: reason.message(),
                });
                None
            }
        };
    }
    if let Some(reg) = isa::classify_register(text) {
        return Some(Operand::Register(reg));
    }
    match isa::validate_symbol_name(text) {
        Ok(()) => Some(Operand::Direct(text.to_string())),
        Err(reason) => {
            *had_errors = true;
            diag.error(AssemblyError::InvalidSymbolName {
                line: line_no,
                name: text.to_string(),
                reason: reason.message(),
            });
            None
        }
    }
}

fn push_extension_word(op: &Operand, code: &mut CodeImage) {
    match op {
        Operand::Immediate(v) => code.push(Word::payload21(Are::Absolute, to_s21(*v))),
        Operand::Direct(_) | Operand::Relative(_) => code.push(Word::zero()),
        Operand::Register(_) => {}
    }
}

/// Validates and splits the two-operand token slice `op1 , op2`,
/// reporting the specific structural error (missing comma, doubled
/// comma, wrong arity) when the shape doesn't match.
fn split_two_operands<'a>(
    tokens: &'a [Token],
    mnemonic: &str,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    had_errors: &mut bool,
) -> Option<(&'a str, &'a str)> {
    match tokens {
        [a, c, b] if !a.is_comma() && c.is_comma() && !b.is_comma() => {
            Some((a.text().unwrap(), b.text().unwrap()))
        }
        [a, b] if !a.is_comma() && !b.is_comma() => {
            *had_errors = true;
            diag.error(AssemblyError::MissingComma { line: line_no });
            None
        }
        [_, c, _, ..] if c.is_comma() => {
            *had_errors = true;
            diag.error(AssemblyError::ExtraComma { line: line_no });
            None
        }
        _ => {
            *had_errors = true;
            diag.error(AssemblyError::WrongOperandCount { line: line_no, mnemonic: mnemonic.to_string() });
            None
        }
    }
}

fn handle_data(
    tokens: &[Token],
    label: Option<&str>,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    data: &mut DataImage,
    had_errors: &mut bool,
) {
    let Some(values) = parse_data_list(tokens, line_no, diag, had_errors) else { return };
    install_data_label(label, line_no, diag, symtab, data, had_errors);
    for v in values {
        data.push(Word::from_full24(to_s24(v)));
    }
}

fn parse_data_list(
    tokens: &[Token],
    line_no: usize,
    diag: &mut dyn Diagnostics,
    had_errors: &mut bool,
) -> Option<Vec<i64>> {
    if tokens.is_empty() {
        *had_errors = true;
        diag.error(AssemblyError::EmptyDataList { line: line_no });
        return None;
    }
    let mut values = Vec::new();
    let mut expect_value = true;
    for tok in tokens {
        if expect_value {
            match tok.text() {
                Some(text) => match parse_signed_decimal(text) {
                    Some(v) => {
                        values.push(v);
                        expect_value = false;
                    }
                    None => {
                        *had_errors = true;
                        diag.error(AssemblyError::MalformedInteger { line: line_no, text: text.to_string() });
                        return None;
                    }
                },
                None => {
                    *had_errors = true;
                    diag.error(AssemblyError::ExtraComma { line: line_no });
                    return None;
                }
            }
        } else if tok.is_comma() {
            expect_value = true;
        } else {
            *had_errors = true;
            diag.error(AssemblyError::ExtraneousTokens { line: line_no });
            return None;
        }
    }
    if expect_value {
        *had_errors = true;
        diag.error(AssemblyError::ExtraComma { line: line_no });
        return None;
    }
    Some(values)
}

fn handle_string(
    raw: &str,
    key_end: usize,
    label: Option<&str>,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    data: &mut DataImage,
    had_errors: &mut bool,
) {
    let remainder = raw[key_end..].trim();
    let malformed = remainder.len() < 2
        || !remainder.starts_with('"')
        || !remainder.ends_with('"')
        || !remainder.chars().all(|c| c == '"' || (c as u32) >= 0x20 && (c as u32) <= 0x7e);
    if malformed {
        *had_errors = true;
        diag.error(AssemblyError::MalformedString { line: line_no });
        return;
    }
    let content = &remainder[1..remainder.len() - 1];
    install_data_label(label, line_no, diag, symtab, data, had_errors);
    for c in content.chars() {
        data.push(Word::from_full24(word::char_to_word(c)));
    }
    data.push(Word::from_full24(0));
}

fn install_data_label(
    label: Option<&str>,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    data: &DataImage,
    had_errors: &mut bool,
) {
    let Some(name) = label else { return };
    if let Err(reason) = isa::validate_symbol_name(name) {
        *had_errors = true;
        diag.error(AssemblyError::InvalidSymbolName {
            line: line_no,
            name: name.to_string(),
            reason: reason.message(),
        });
        return;
    }
    // Tentative address: the code image's contribution is added once
    // its final size is known, by `shift_data_addresses` at the end of
    // this pass (spec.md §4.5, §4.6).
    let address = data.len() as i64;
    if symtab.install(name, address, false, false, true).is_err() {
        *had_errors = true;
        diag.error(AssemblyError::DuplicateSymbol { line: line_no, name: name.to_string() });
    }
}

fn handle_extern(
    tokens: &[Token],
    label: Option<&str>,
    line_no: usize,
    diag: &mut dyn Diagnostics,
    symtab: &mut SymbolTable,
    had_errors: &mut bool,
) {
    if label.is_some() {
        diag.warning(AssemblyWarning::LabelOnExtern { line: line_no });
    }
    let name = match tokens {
        [t] if t.text().is_some() => t.text().unwrap(),
        _ => {
            *had_errors = true;
            diag.error(AssemblyError::ExtraneousTokens { line: line_no });
            return;
        }
    };
    if let Err(reason) = isa::validate_symbol_name(name) {
        *had_errors = true;
        diag.error(AssemblyError::InvalidSymbolName {
            line: line_no,
            name: name.to_string(),
            reason: reason.message(),
        });
        return;
    }
    if symtab.install(name, 0, true, false, false).is_err() {
        *had_errors = true;
        diag.error(AssemblyError::DuplicateSymbol { line: line_no, name: name.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::VecDiagnostics;

    fn run(src: &str) -> (bool, SymbolTable, CodeImage, DataImage, VecDiagnostics) {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        let mut diag = VecDiagnostics::new();
        let mut symtab = SymbolTable::new();
        let mut code = CodeImage::new();
        let mut data = DataImage::new();
        let had_errors = first_pass(&lines, &mut diag, &mut symtab, &mut code, &mut data);
        (had_errors, symtab, code, data, diag)
    }

    #[test]
    fn minimal_stop() {
        let (had_errors, _symtab, code, data, diag) = run("stop");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(code.len(), 1);
        assert_eq!(data.len(), 0);
        assert_eq!(crate::word::format_word_hex(code.get(0)), "3c0000");
    }

    #[test]
    fn extern_then_jmp_leaves_placeholder() {
        let (had_errors, symtab, code, _data, diag) = run(".extern X\njmp X");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(code.len(), 2);
        assert_eq!(code.get(1), crate::word::Word::zero());
        assert!(symtab.lookup("X").unwrap().external);
    }

    #[test]
    fn entry_and_data_shift() {
        let (had_errors, symtab, code, data, diag) = run(".entry L\nL: .data 5, -1\nstop");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(code.len(), 1);
        assert_eq!(data.len(), 2);
        assert_eq!(symtab.lookup("L").unwrap().address, 101);
        assert_eq!(crate::word::format_word_hex(data.get(0)), "000005");
        assert_eq!(crate::word::format_word_hex(data.get(1)), "ffffff");
    }

    #[test]
    fn relative_label_placeholder_and_address() {
        let (had_errors, symtab, code, _data, diag) = run("HERE: jmp &HERE\nstop");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(symtab.lookup("HERE").unwrap().address, 100);
        assert_eq!(code.len(), 3);
        assert_eq!(code.get(1), crate::word::Word::zero());
    }

    #[test]
    fn two_register_operands_produce_single_word() {
        let (had_errors, _symtab, code, _data, diag) = run("mov r3, r5");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(code.len(), 1);
        assert_eq!(code.get(0).get_field(&crate::word::SRC_REG), 3);
        assert_eq!(code.get(0).get_field(&crate::word::DEST_REG), 5);
    }

    #[test]
    fn string_literal_data() {
        let (had_errors, symtab, _code, data, diag) = run("S: .string \"Hi\"");
        assert!(!had_errors, "{:?}", diag.errors);
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(0).raw(), 0x48);
        assert_eq!(data.get(1).raw(), 0x69);
        assert_eq!(data.get(2).raw(), 0);
        assert_eq!(symtab.lookup("S").unwrap().address, 100);
    }

    #[test]
    fn duplicate_symbol_is_an_error() {
        let (had_errors, _symtab, _code, _data, diag) = run("A: .data 1\nA: .data 2");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::DuplicateSymbol { .. })));
    }

    #[test]
    fn data_list_rejects_trailing_comma() {
        let (had_errors, _symtab, _code, _data, diag) = run(".data 1,");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::ExtraComma { .. })));
    }

    #[test]
    fn bad_addressing_mode_is_rejected() {
        let (had_errors, _symtab, _code, _data, diag) = run("lea #5, r0");
        assert!(had_errors);
        assert!(diag.errors.iter().any(|e| matches!(e, AssemblyError::BadOperandMode { .. })));
    }
}
