//! Emitter (spec.md §4.7): formats and writes the object, externals,
//! and entries files for one successfully assembled input.

use std::io::Write;

use crate::diag::FatalError;
use crate::symbol::SymbolTable;
use crate::word::{format_address_decimal, format_word_hex, CodeImage, DataImage, ExternalRefs, INITIAL_LOAD_ADDR};

/// Destination for the three output artifacts. The driver's
/// implementation creates real files named `<base>.ob`/`.ext`/`.ent`;
/// tests implement it over an in-memory buffer so assertions can check
/// exact formatted bytes without touching a filesystem.
pub trait OutputSink {
    type File: Write;
    fn create(&mut self, suffix: &str) -> Result<Self::File, FatalError>;
}

/// Creates `<base><suffix>` on the real filesystem for each call.
pub struct FileOutputSink {
    base: String,
}

impl FileOutputSink {
    pub fn new(base: &str) -> Self {
        FileOutputSink { base: base.to_string() }
    }
}

impl OutputSink for FileOutputSink {
    type File = std::fs::File;

    fn create(&mut self, suffix: &str) -> Result<Self::File, FatalError> {
        let path = format!("{}{}", self.base, suffix);
        std::fs::File::create(&path).map_err(|source| FatalError::Open { path, source })
    }
}

/// Writes the object file unconditionally (called only once both
/// passes have succeeded), the externals file iff `externals` is
/// non-empty, and the entries file iff at least one symbol is
/// entry-flagged. No trailing newline after the final line of any file
/// (spec.md §4.7).
pub fn emit<S: OutputSink>(
    sink: &mut S,
    code: &CodeImage,
    data: &DataImage,
    externals: &ExternalRefs,
    symtab: &SymbolTable,
) -> Result<(), FatalError> {
    write_object(sink, code, data)?;
    if !externals.is_empty() {
        write_externals(sink, externals)?;
    }
    let entries: Vec<_> = symtab.in_declaration_order().filter(|(_, sym)| sym.entry).collect();
    if !entries.is_empty() {
        write_entries(sink, &entries)?;
    }
    Ok(())
}

fn write_object<S: OutputSink>(sink: &mut S, code: &CodeImage, data: &DataImage) -> Result<(), FatalError> {
    let path = ".ob".to_string();
    let mut out = sink.create(&path)?;
    let mut lines = Vec::with_capacity(2 + code.len() + data.len());
    lines.push(format!("{} {}", code.len(), data.len()));
    for (offset, word) in code.iter().enumerate() {
        let addr = INITIAL_LOAD_ADDR + offset as i64;
        lines.push(format!("{} {}", format_address_decimal(addr), format_word_hex(word)));
    }
    lines.push(String::new());
    let data_base = INITIAL_LOAD_ADDR + code.len() as i64;
    for (offset, word) in data.iter().enumerate() {
        let addr = data_base + offset as i64;
        lines.push(format!("{} {}", format_address_decimal(addr), format_word_hex(word)));
    }
    write_lines(&mut out, &lines, &path)
}

fn write_externals<S: OutputSink>(sink: &mut S, externals: &ExternalRefs) -> Result<(), FatalError> {
    let path = ".ext".to_string();
    let mut out = sink.create(&path)?;
    let lines: Vec<String> =
        externals.iter().map(|r| format!("{} {}", r.name, format_address_decimal(r.address))).collect();
    write_lines(&mut out, &lines, &path)
}

fn write_entries<S: OutputSink>(
    sink: &mut S,
    entries: &[(&str, &crate::symbol::Symbol)],
) -> Result<(), FatalError> {
    let path = ".ent".to_string();
    let mut out = sink.create(&path)?;
    let lines: Vec<String> =
        entries.iter().map(|(name, sym)| format!("{} {}", name, format_address_decimal(sym.address))).collect();
    write_lines(&mut out, &lines, &path)
}

fn write_lines<W: Write>(out: &mut W, lines: &[String], path: &str) -> Result<(), FatalError> {
    let body = lines.join("\n");
    out.write_all(body.as_bytes())
        .map_err(|source| FatalError::Write { path: path.to_string(), source })?;
    out.flush().map_err(|source| FatalError::Close { path: path.to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass1::first_pass;
    use crate::pass2::second_pass;
    use crate::diag::VecDiagnostics;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct MemSink {
        files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    }

    struct MemFile {
        suffix: String,
        files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
        buf: Vec<u8>,
    }

    impl Write for MemFile {
        fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
            self.buf.write(b)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Drop for MemFile {
        fn drop(&mut self) {
            self.files.borrow_mut().insert(self.suffix.clone(), std::mem::take(&mut self.buf));
        }
    }

    impl OutputSink for MemSink {
        type File = MemFile;
        fn create(&mut self, suffix: &str) -> Result<Self::File, FatalError> {
            Ok(MemFile { suffix: suffix.to_string(), files: self.files.clone(), buf: Vec::new() })
        }
    }

    fn assemble(src: &str) -> (CodeImage, DataImage, ExternalRefs, crate::symbol::SymbolTable) {
        let lines: Vec<String> = src.lines().map(str::to_string).collect();
        let mut diag = VecDiagnostics::new();
        let mut symtab = crate::symbol::SymbolTable::new();
        let mut code = CodeImage::new();
        let mut data = DataImage::new();
        let p1 = first_pass(&lines, &mut diag, &mut symtab, &mut code, &mut data);
        let mut externals = ExternalRefs::new();
        let p2 = second_pass(&lines, &mut diag, &mut symtab, &mut code, &mut externals, p1);
        assert!(!p1 && !p2, "{:?}", diag.errors);
        (code, data, externals, symtab)
    }

    fn text(files: &HashMap<String, Vec<u8>>, suffix: &str) -> String {
        String::from_utf8(files[suffix].clone()).unwrap()
    }

    #[test]
    fn s1_minimal_stop() {
        let (code, data, externals, symtab) = assemble("stop");
        let mut sink = MemSink::default();
        emit(&mut sink, &code, &data, &externals, &symtab).unwrap();
        let files = sink.files.borrow();
        assert_eq!(text(&files, ".ob"), "1 0\n0000100 3c0000\n");
        assert!(!files.contains_key(".ext"));
        assert!(!files.contains_key(".ent"));
    }

    #[test]
    fn s3_entry_and_data() {
        let (code, data, externals, symtab) = assemble(".entry L\nL: .data 5, -1\nstop");
        let mut sink = MemSink::default();
        emit(&mut sink, &code, &data, &externals, &symtab).unwrap();
        let files = sink.files.borrow();
        assert_eq!(text(&files, ".ob"), "1 2\n0000100 3c0000\n\n0000101 000005\n0000102 ffffff");
        assert_eq!(text(&files, ".ent"), "L 0000101");
        assert!(!files.contains_key(".ext"));
    }

    #[test]
    fn s2_external_reference() {
        let (code, data, externals, symtab) = assemble(".extern X\njmp X");
        let mut sink = MemSink::default();
        emit(&mut sink, &code, &data, &externals, &symtab).unwrap();
        let files = sink.files.borrow();
        assert_eq!(text(&files, ".ext"), "X 0000101");
        let _ = code;
        let _ = data;
    }
}
