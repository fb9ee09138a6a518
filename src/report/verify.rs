//! In-source verification directives.
//!
//! Comment directives drive the unit-test harness:
//! `// expected-error[@loc] {{ substring }}` asserts one matching error at
//! the given location; `expected-warning` the same for warnings;
//! `// swc-option lex-only` stops the pipeline after lexing. Directives left
//! untouched at the end of the compile raise `unittest_err_not_raised`.

use std::sync::OnceLock;

use bitflags::bitflags;
use regex::Regex;

use crate::lexer::lang;
use crate::lexer::source_view::SourceView;
use crate::lexer::token::TokenId;
use crate::report::diagnostic::{Diagnostic, Severity};

bitflags! {
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct VerifyFlags: u32 {
        const LEX_ONLY = 1 << 0;
    }
}

#[derive(Clone, Debug)]
pub struct VerifyDirective {
    pub kind: Severity,
    pub matches: String,
    /// Line of the directive comment itself.
    pub my_line: u32,
    /// Exact/range constraint; both zero means "anywhere".
    pub line_min: u32,
    pub line_max: u32,
    /// One-of list; overrides min/max when non-empty.
    pub allowed_lines: Vec<u32>,
    pub touched: bool,
}

impl VerifyDirective {
    fn matches_line(&self, line: u32) -> bool {
        if !self.allowed_lines.is_empty() {
            return self.allowed_lines.contains(&line);
        }
        if self.line_min == 0 && self.line_max == 0 {
            return true;
        }
        line >= self.line_min && line <= self.line_max
    }
}

#[derive(Default)]
pub struct Verify {
    directives: Vec<VerifyDirective>,
    flags: VerifyFlags,
}

fn expected_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"expected-(error|warning)").expect("valid regex"))
}

fn match_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(.*?)\}\}").expect("valid regex"))
}

fn option_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"swc-option\s+([A-Za-z0-9,\s-]+)").expect("valid regex"))
}

// Parses an optional signed or absolute value at `i`. A bare sign means +/-1.
fn parse_signed_or_abs(s: &[u8], i: &mut usize) -> Option<(i64, bool)> {
    let mut has_sign = false;
    let mut sign = 1i64;
    if *i < s.len() && (s[*i] == b'+' || s[*i] == b'-') {
        has_sign = true;
        if s[*i] == b'-' {
            sign = -1;
        }
        *i += 1;
    }
    let start = *i;
    let mut value = 0i64;
    while *i < s.len() && s[*i].is_ascii_digit() {
        value = value * 10 + (s[*i] - b'0') as i64;
        *i += 1;
    }
    if start == *i {
        if has_sign {
            return Some((sign, true)); // implicit +/-1
        }
        return None;
    }
    Some((sign * value, has_sign))
}

fn clamp_line(v: i64) -> u32 {
    if v > 0 {
        v as u32
    } else {
        1
    }
}

impl Verify {
    pub fn flags(&self) -> VerifyFlags {
        self.flags
    }

    pub fn directives(&self) -> &[VerifyDirective] {
        &self.directives
    }

    /// Scans line-comment trivia of a lexed view for directives.
    pub fn tokenize(&mut self, view: &SourceView) {
        for trivia in view.trivia() {
            if trivia.tok.is_not(TokenId::CommentLine) {
                continue;
            }
            let comment = view.trivia_text(trivia);
            let line = view.line_col(trivia.tok.byte_start).line;
            self.tokenize_expected(comment, line);
            self.tokenize_option(comment);
        }
    }

    fn tokenize_expected(&mut self, comment: &str, base_line: u32) {
        for caps in expected_re().captures_iter(comment) {
            let whole = caps.get(0).expect("regex group 0");
            let kind = match &caps[1] {
                "error" => Severity::Error,
                _ => Severity::Warning,
            };

            let mut directive = VerifyDirective {
                kind,
                matches: String::new(),
                my_line: base_line,
                line_min: base_line,
                line_max: base_line,
                allowed_lines: Vec::new(),
                touched: false,
            };

            let bytes = comment.as_bytes();
            let mut i = whole.end();
            i = parse_line_constraint(bytes, i, &mut directive);

            // Every following {{...}} block becomes one directive instance.
            for block in match_block_re().captures_iter(&comment[i..]) {
                let mut dir = directive.clone();
                dir.matches = block[1].trim().to_string();
                self.directives.push(dir);
            }
        }
    }

    fn tokenize_option(&mut self, comment: &str) {
        if let Some(caps) = option_re().captures(comment) {
            for word in caps[1].split(|c: char| c == ',' || c.is_whitespace()) {
                let word = word.trim();
                if word.bytes().all(lang::is_option) && word == "lex-only" {
                    self.flags |= VerifyFlags::LEX_ONLY;
                }
            }
        }
    }

    /// Tries to consume the diagnostic as expected. Returns true when some
    /// directive matched; the directive is marked touched.
    pub fn match_diag(&mut self, diag: &Diagnostic) -> bool {
        let line = diag.primary_line().unwrap_or(0);
        for directive in &mut self.directives {
            if directive.touched || directive.kind != diag.severity {
                continue;
            }
            if !directive.matches_line(line) {
                continue;
            }
            let wanted = directive.matches.as_str();
            let hit = diag.id.as_str().contains(wanted)
                || diag.id.default_message().contains(wanted)
                || diag.args.iter().any(|(_, v)| v.contains(wanted));
            if !hit {
                continue;
            }
            directive.touched = true;
            return true;
        }
        false
    }

    /// Directives never matched by any diagnostic.
    pub fn untouched(&self) -> impl Iterator<Item = &VerifyDirective> {
        self.directives.iter().filter(|d| !d.touched)
    }
}

// Consumes an optional `@...` location constraint:
//   @*              anywhere
//   @+N / @-N       relative offset (bare sign means 1)
//   @+A..+B         inclusive relative range
//   @(a, +b, -c)    one-of list, absolute when unsigned
fn parse_line_constraint(bytes: &[u8], mut i: usize, directive: &mut VerifyDirective) -> usize {
    let base = directive.my_line;

    if i >= bytes.len() || bytes[i] != b'@' {
        return i;
    }
    i += 1;

    if i < bytes.len() && bytes[i] == b'*' {
        directive.line_min = 0;
        directive.line_max = 0;
        return i + 1;
    }

    if i < bytes.len() && bytes[i] == b'(' {
        i += 1;
        let mut lines = Vec::new();
        loop {
            while i < bytes.len() && lang::is_blank(bytes[i]) {
                i += 1;
            }
            let Some((value, has_sign)) = parse_signed_or_abs(bytes, &mut i) else {
                break;
            };
            if has_sign {
                lines.push(clamp_line(base as i64 + value));
            } else {
                lines.push(clamp_line(value));
            }
            while i < bytes.len() && lang::is_blank(bytes[i]) {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b',' {
                i += 1;
                continue;
            }
            break;
        }
        while i < bytes.len() && bytes[i] != b')' {
            i += 1;
        }
        if i < bytes.len() {
            i += 1;
        }
        if !lines.is_empty() {
            directive.allowed_lines = lines;
        }
        return i;
    }

    let save = i;
    match parse_signed_or_abs(bytes, &mut i) {
        Some((off_a, true)) => {
            let line_a = clamp_line(base as i64 + off_a);
            if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1] == b'.' {
                i += 2;
                match parse_signed_or_abs(bytes, &mut i) {
                    Some((off_b, true)) => {
                        let line_b = clamp_line(base as i64 + off_b);
                        directive.line_min = line_a.min(line_b);
                        directive.line_max = line_a.max(line_b);
                    }
                    _ => {
                        directive.line_min = line_a;
                        directive.line_max = line_a;
                    }
                }
            } else {
                directive.line_min = line_a;
                directive.line_max = line_a;
            }
            i
        }
        _ => save, // malformed: keep the default exact-line constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileRef;
    use crate::lexer::Lexer;
    use crate::report::diagnostic::{DiagnosticId, SourceLocation};
    use std::sync::Arc;

    fn verify_for(src: &str) -> Verify {
        let out = Lexer::tokenize(FileRef::new(0), Arc::from(src));
        let mut verify = Verify::default();
        verify.tokenize(&out.view);
        verify
    }

    fn diag_at(id: DiagnosticId, line: u32) -> Diagnostic {
        let mut diag = Diagnostic::new(id, FileRef::new(0));
        diag.add_span(SourceLocation {
            path: "test.swg".into(),
            line,
            col: 1,
            len: 1,
        });
        diag
    }

    #[test]
    fn parses_expected_error() {
        let verify = verify_for("const x = 1 // expected-error {{ overflow }}\n");
        assert_eq!(verify.directives().len(), 1);
        let d = &verify.directives()[0];
        assert_eq!(d.kind, Severity::Error);
        assert_eq!(d.matches, "overflow");
        assert_eq!(d.line_min, 1);
        assert_eq!(d.line_max, 1);
    }

    #[test]
    fn location_forms() {
        let verify = verify_for("// expected-error@* {{ a }}\n// expected-error@+2 {{ b }}\n// expected-error@(4, +1) {{ c }}\n");
        let d = verify.directives();
        assert_eq!(d[0].line_min, 0);
        assert_eq!(d[0].line_max, 0);
        assert_eq!(d[1].line_min, 4);
        assert_eq!(d[1].line_max, 4);
        assert_eq!(d[2].allowed_lines, vec![4, 4]);
    }

    #[test]
    fn range_form() {
        let verify = verify_for("// expected-error@+1..+3 {{ x }}\n");
        let d = &verify.directives()[0];
        assert_eq!(d.line_min, 2);
        assert_eq!(d.line_max, 4);
    }

    #[test]
    fn matches_and_touches() {
        let mut verify = verify_for("const x: s8 = 200 // expected-error {{ overflow }}\n");
        let diag = diag_at(DiagnosticId::SemaErrLiteralOverflow, 1);
        assert!(verify.match_diag(&diag));
        assert_eq!(verify.untouched().count(), 0);

        // Second identical diagnostic does not match a second time.
        assert!(!verify.match_diag(&diag));
    }

    #[test]
    fn severity_must_match() {
        let mut verify = verify_for("const x = 1 // expected-warning {{ overflow }}\n");
        let diag = diag_at(DiagnosticId::SemaErrLiteralOverflow, 1);
        assert!(!verify.match_diag(&diag));
        assert_eq!(verify.untouched().count(), 1);
    }

    #[test]
    fn lex_only_option() {
        let verify = verify_for("// swc-option lex-only\n");
        assert!(verify.flags().contains(VerifyFlags::LEX_ONLY));
    }
}
