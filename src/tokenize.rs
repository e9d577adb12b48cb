//! Whitespace/comma tokeniser shared by the first and second passes.
//!
//! Both passes re-tokenise the same source line independently (see
//! `DESIGN.md`); this module is the single place that decides where one
//! token ends and the next begins, so the two passes can never disagree
//! about it.

/// One token: a run of non-whitespace, non-comma characters, or a
/// single literal comma.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Comma,
    Word(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character after this token. Source is
    /// 7-bit ASCII (spec.md Non-goals), so byte and char offsets agree.
    pub end: usize,
}

impl Token {
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            TokenKind::Comma => None,
        }
    }

    pub fn is_comma(&self) -> bool {
        matches!(self.kind, TokenKind::Comma)
    }
}

pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_end = 0;

    let flush = |current: &mut String, end: usize, tokens: &mut Vec<Token>| {
        if !current.is_empty() {
            tokens.push(Token { kind: TokenKind::Word(std::mem::take(current)), end });
        }
    };

    for (i, c) in line.char_indices() {
        let after = i + c.len_utf8();
        if c.is_whitespace() {
            flush(&mut current, i, &mut tokens);
        } else if c == ',' {
            flush(&mut current, i, &mut tokens);
            tokens.push(Token { kind: TokenKind::Comma, end: after });
        } else {
            if current.is_empty() {
                current_end = i;
            }
            let _ = current_end;
            current.push(c);
            current_end = after;
        }
    }
    flush(&mut current, current_end, &mut tokens);
    tokens
}

/// A line is a comment iff its very first character (not first
/// non-whitespace) is `;` (spec.md §9 design note 3: preserved for
/// compatibility).
pub fn is_comment(raw: &str) -> bool {
    raw.chars().next() == Some(';')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        tokenize(line)
            .into_iter()
            .map(|t| match t.kind {
                TokenKind::Word(w) => w,
                TokenKind::Comma => ",".to_string(),
            })
            .collect()
    }

    #[test]
    fn splits_on_whitespace_and_comma() {
        assert_eq!(words("mov r3, r5"), vec!["mov", "r3", ",", "r5"]);
        assert_eq!(words("  .data 5,-1  "), vec![".data", "5", ",", "-1"]);
        assert_eq!(words("r3,r5"), vec!["r3", ",", "r5"]);
    }

    #[test]
    fn empty_and_whitespace_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("    ").is_empty());
    }

    #[test]
    fn comment_is_first_char_only() {
        assert!(is_comment("; a comment"));
        assert!(!is_comment("   ; not a comment (leading space)"));
        assert!(!is_comment("mov r1, r2"));
    }

    #[test]
    fn token_end_offsets_allow_remainder_slicing() {
        let line = r#"S: .string "Hi""#;
        let tokens = tokenize(line);
        // tokens: "S:" "." ... actually ".string" is one word token.
        let key = tokens.iter().find(|t| t.text() == Some(".string")).unwrap();
        assert_eq!(line[key.end..].trim(), "\"Hi\"");
    }
}
