//! Instruction table, addressing-mode enum, and the small decision
//! functions (register/directive classification, symbol-name
//! validation) that the rest of the assembler builds on.

/// Addressing mode of one operand. The discriminant values double as
/// the 2-bit encoding stored in [`crate::word::SRC_ADDR`] /
/// [`crate::word::DEST_ADDR`], and as the bit position in a
/// [`ModeSet`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressingMode {
    Immediate = 0,
    Direct = 1,
    Relative = 2,
    Register = 3,
}

impl AddressingMode {
    pub fn encoding(self) -> u32 {
        self as u32
    }

    fn bit(self) -> ModeSet {
        1 << (self as u8)
    }
}

/// A set of permitted addressing modes, one bit per [`AddressingMode`]
/// discriminant, narrowed to the four modes this language has.
pub type ModeSet = u8;

pub const MODE_IMM: ModeSet = AddressingMode::Immediate.bit();
pub const MODE_DIR: ModeSet = AddressingMode::Direct.bit();
pub const MODE_REL: ModeSet = AddressingMode::Relative.bit();
pub const MODE_REG: ModeSet = AddressingMode::Register.bit();
pub const MODE_NONE: ModeSet = 0;

pub fn allows(set: ModeSet, mode: AddressingMode) -> bool {
    set & mode.bit() != 0
}

/// Read-only descriptor for one mnemonic.
#[derive(Clone, Copy, Debug)]
pub struct InstructionDescriptor {
    pub mnemonic: &'static str,
    pub opcode: u32,
    pub funct: u32,
    pub operand_count: u8,
    pub src_modes: ModeSet,
    pub dst_modes: ModeSet,
}

macro_rules! instr {
    ($mnemonic:literal, $opcode:literal, $funct:literal, $count:literal, $src:expr, $dst:expr) => {
        InstructionDescriptor {
            mnemonic: $mnemonic,
            opcode: $opcode,
            funct: $funct,
            operand_count: $count,
            src_modes: $src,
            dst_modes: $dst,
        }
    };
}

const TWO_SRC: ModeSet = MODE_IMM | MODE_DIR | MODE_REG;
const TWO_DST: ModeSet = MODE_DIR | MODE_REG;
const ONE_DST_DATA: ModeSet = MODE_DIR | MODE_REG;
const ONE_DST_JUMP: ModeSet = MODE_DIR | MODE_REL;
const ONE_DST_PRN: ModeSet = MODE_IMM | MODE_DIR | MODE_REG;

static INSTRUCTIONS: &[InstructionDescriptor] = &[
    instr!("mov", 0, 0, 2, TWO_SRC, TWO_DST),
    instr!("cmp", 1, 0, 2, TWO_SRC, TWO_SRC),
    instr!("add", 2, 1, 2, TWO_SRC, TWO_DST),
    instr!("sub", 2, 2, 2, TWO_SRC, TWO_DST),
    instr!("lea", 4, 0, 2, MODE_DIR, TWO_DST),
    instr!("clr", 5, 1, 1, MODE_NONE, ONE_DST_DATA),
    instr!("not", 5, 2, 1, MODE_NONE, ONE_DST_DATA),
    instr!("inc", 5, 3, 1, MODE_NONE, ONE_DST_DATA),
    instr!("dec", 5, 4, 1, MODE_NONE, ONE_DST_DATA),
    instr!("jmp", 9, 1, 1, MODE_NONE, ONE_DST_JUMP),
    instr!("bne", 9, 2, 1, MODE_NONE, ONE_DST_JUMP),
    instr!("jsr", 9, 3, 1, MODE_NONE, ONE_DST_JUMP),
    instr!("red", 12, 0, 1, MODE_NONE, ONE_DST_DATA),
    instr!("prn", 13, 0, 1, MODE_NONE, ONE_DST_PRN),
    instr!("rts", 14, 0, 0, MODE_NONE, MODE_NONE),
    instr!("stop", 15, 0, 0, MODE_NONE, MODE_NONE),
];

pub fn find_instruction(mnemonic: &str) -> Option<&'static InstructionDescriptor> {
    INSTRUCTIONS.iter().find(|d| d.mnemonic == mnemonic)
}

/// Directive keyword, with the leading `.` already stripped by the
/// caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Directive {
    Data,
    String,
    Entry,
    Extern,
    Unknown,
}

pub fn classify_directive(name: &str) -> Directive {
    match name {
        "data" => Directive::Data,
        "string" => Directive::String,
        "entry" => Directive::Entry,
        "extern" => Directive::Extern,
        _ => Directive::Unknown,
    }
}

/// A token `r` followed by exactly one digit `0`..=`7`.
pub fn classify_register(token: &str) -> Option<u8> {
    let mut chars = token.chars();
    if chars.next()? != 'r' {
        return None;
    }
    let digit = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    match digit {
        '0'..='7' => Some(digit as u8 - b'0'),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolNameError {
    Empty,
    NotAlphaStart,
    NotAlnumRest,
    TooLong,
    Reserved,
}

pub const MAX_SYMBOL_LEN: usize = 31;

/// Parses a decimal integer with an optional leading `+` or `-`.
/// `None` on any other character, including an empty string.
pub fn parse_signed_decimal(text: &str) -> Option<i64> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(d) => (true, d),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if neg { -value } else { value })
}

fn is_reserved(name: &str) -> bool {
    find_instruction(name).is_some()
        || classify_directive(name) != Directive::Unknown
        || classify_register(name).is_some()
}

pub fn validate_symbol_name(name: &str) -> Result<(), SymbolNameError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(SymbolNameError::Empty)?;
    if !first.is_ascii_alphabetic() {
        return Err(SymbolNameError::NotAlphaStart);
    }
    if !chars.clone().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SymbolNameError::NotAlnumRest);
    }
    if name.len() > MAX_SYMBOL_LEN {
        return Err(SymbolNameError::TooLong);
    }
    if is_reserved(name) {
        return Err(SymbolNameError::Reserved);
    }
    Ok(())
}

/// Classifies an operand token by its first character, independent of
/// whether the referenced symbol (if any) actually exists — existence
/// is a pass-2 concern (spec.md §9 design note: operands are a tagged
/// variant, looked up at the point of emission rather than aliased
/// through the parser).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Immediate(i64),
    Direct(String),
    Relative(String),
    Register(u8),
}

impl SymbolNameError {
    pub fn message(self) -> &'static str {
        match self {
            SymbolNameError::Empty => "symbol name is empty",
            SymbolNameError::NotAlphaStart => "symbol name must start with a letter",
            SymbolNameError::NotAlnumRest => "symbol name must be letters and digits only",
            SymbolNameError::TooLong => "symbol name exceeds 31 characters",
            SymbolNameError::Reserved => "symbol name collides with a mnemonic, directive, or register",
        }
    }
}

/// Classifies an operand token by shape alone, without validating its
/// payload (malformed integers default to 0, symbol names are not
/// syntax-checked). Used by the second pass, which only needs to know
/// how many code-image words to step over and, for direct/relative
/// operands, the symbol name to look up — not to re-validate syntax
/// the first pass already owns.
pub fn classify_operand(text: &str) -> Operand {
    if let Some(digits) = text.strip_prefix('#') {
        return Operand::Immediate(parse_signed_decimal(digits).unwrap_or(0));
    }
    if let Some(name) = text.strip_prefix('&') {
        return Operand::Relative(name.to_string());
    }
    if let Some(reg) = classify_register(text) {
        return Operand::Register(reg);
    }
    Operand::Direct(text.to_string())
}

impl Operand {
    pub fn mode(&self) -> AddressingMode {
        match self {
            Operand::Immediate(_) => AddressingMode::Immediate,
            Operand::Direct(_) => AddressingMode::Direct,
            Operand::Relative(_) => AddressingMode::Relative,
            Operand::Register(_) => AddressingMode::Register,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_tokens() {
        assert_eq!(classify_register("r0"), Some(0));
        assert_eq!(classify_register("r7"), Some(7));
        assert_eq!(classify_register("r8"), None);
        assert_eq!(classify_register("r10"), None);
        assert_eq!(classify_register("reg"), None);
    }

    #[test]
    fn directives() {
        assert_eq!(classify_directive("data"), Directive::Data);
        assert_eq!(classify_directive("bogus"), Directive::Unknown);
    }

    #[test]
    fn instruction_lookup() {
        let mov = find_instruction("mov").unwrap();
        assert_eq!(mov.opcode, 0);
        assert_eq!(mov.operand_count, 2);
        assert!(allows(mov.dst_modes, AddressingMode::Register));
        assert!(!allows(mov.dst_modes, AddressingMode::Immediate));
        assert!(find_instruction("xyz").is_none());
    }

    #[test]
    fn symbol_name_rules() {
        assert_eq!(validate_symbol_name(""), Err(SymbolNameError::Empty));
        assert_eq!(validate_symbol_name("1abc"), Err(SymbolNameError::NotAlphaStart));
        assert_eq!(validate_symbol_name("a-b"), Err(SymbolNameError::NotAlnumRest));
        assert_eq!(validate_symbol_name("mov"), Err(SymbolNameError::Reserved));
        assert_eq!(validate_symbol_name("r3"), Err(SymbolNameError::Reserved));
        assert!(validate_symbol_name("HERE").is_ok());
        let long = "a".repeat(31);
        assert!(validate_symbol_name(&long).is_ok());
        let too_long = "a".repeat(32);
        assert_eq!(validate_symbol_name(&too_long), Err(SymbolNameError::TooLong));
    }
}
