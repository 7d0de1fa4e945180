//! Lexer
//!
//! A state machine over one source buffer, producing one token per
//! call. Escaped newlines and trigraphs are folded transparently by the
//! character reader; any token whose byte range contains such a
//! sequence carries the needs-cleaning flag so consumers re-read it
//! through [`get_char_and_size_no_warn`].
//!
//! Raw mode disables identifier interning, keyword mapping, and
//! diagnostics; it is what directive skipping and `-dump-raw-tokens`
//! use. The lexer never aborts on bad input: every illegal construct is
//! reported through the diagnostics engine and the lexer advances past
//! the offending byte.

use cptoyc_basic::{
    DiagnosticLevel, DiagnosticsEngine, FileID, IdentifierTable, LangOptions, SourceLocation,
    SourceManager, TokenKind,
};

use crate::multiple_include_opt::MultipleIncludeOpt;
use crate::token::{PPConditionalInfo, Token};

/// Collaborators threaded through a non-raw lex call.
struct Cx<'a> {
    diags: &'a mut DiagnosticsEngine,
    identifiers: &'a mut IdentifierTable,
}

/// A cursor over buffer bytes that reads through trigraphs and escaped
/// newlines. `dirty` records whether anything needed folding; the token
/// being built inherits it as the needs-cleaning flag.
#[derive(Clone, Copy)]
struct Scan<'b> {
    data: &'b [u8],
    off: usize,
    dirty: bool,
    trigraphs: bool,
}

impl<'b> Scan<'b> {
    fn new(data: &'b [u8], off: usize, trigraphs: bool) -> Self {
        Self {
            data,
            off,
            dirty: false,
            trigraphs,
        }
    }

    /// The logical character at the cursor.
    fn peek(&self) -> u8 {
        get_char_and_size(self.data, self.off, self.trigraphs).0
    }

    /// The logical character after the one at the cursor.
    fn peek_second(&self) -> u8 {
        let mut probe = *self;
        probe.bump();
        probe.peek()
    }

    /// Consume the logical character at the cursor.
    fn bump(&mut self) -> u8 {
        let (c, size) = get_char_and_size(self.data, self.off, self.trigraphs);
        self.off += size;
        if size != 1 {
            self.dirty = true;
        }
        c
    }
}

/// The state machine.
pub struct Lexer {
    fid: FileID,
    /// Current byte offset in the buffer.
    pos: usize,
    /// Offset of the NUL sentinel (the logical buffer size).
    end: usize,
    lang_opts: LangOptions,

    // Per-position state carried between tokens.
    is_at_start_of_line: bool,
    has_leading_space: bool,

    // Context-specific modes toggled by the preprocessor.
    parsing_preprocessor_directive: bool,
    parsing_filename: bool,
    lexing_raw_mode: bool,
    keep_whitespace_mode: bool,
    keep_comment_mode: bool,

    miopt: MultipleIncludeOpt,
    conditional_stack: Vec<PPConditionalInfo>,
}

impl Lexer {
    /// A lexer for file `fid`, in normal (preprocessor-driven) mode.
    pub fn new(fid: FileID, sm: &SourceManager, opts: &LangOptions) -> Self {
        Self::with_mode(fid, 0, sm, opts, false)
    }

    /// A raw-mode lexer for file `fid`, starting at offset 0.
    pub fn new_raw(fid: FileID, sm: &SourceManager, opts: &LangOptions) -> Self {
        Self::with_mode(fid, 0, sm, opts, true)
    }

    /// A raw-mode lexer positioned at a byte offset, for re-lexing one
    /// token out of context.
    pub fn new_raw_at(fid: FileID, offset: usize, sm: &SourceManager, opts: &LangOptions) -> Self {
        Self::with_mode(fid, offset, sm, opts, true)
    }

    fn with_mode(
        fid: FileID,
        offset: usize,
        sm: &SourceManager,
        opts: &LangOptions,
        raw: bool,
    ) -> Self {
        let end = sm.buffer(fid).len();
        debug_assert!(offset <= end, "lexer start offset outside buffer");
        Self {
            fid,
            pos: offset,
            end,
            lang_opts: *opts,
            is_at_start_of_line: offset == 0,
            has_leading_space: false,
            parsing_preprocessor_directive: false,
            parsing_filename: false,
            lexing_raw_mode: raw,
            keep_whitespace_mode: false,
            keep_comment_mode: false,
            miopt: MultipleIncludeOpt::new(),
            conditional_stack: Vec::new(),
        }
    }

    pub fn file_id(&self) -> FileID {
        self.fid
    }

    pub fn is_lexing_raw_mode(&self) -> bool {
        self.lexing_raw_mode
    }

    /// In whitespace-keeping mode every whitespace run comes back as an
    /// `unknown` token, so concatenating spellings reproduces the input.
    pub fn set_keep_whitespace_mode(&mut self, val: bool) {
        self.keep_whitespace_mode = val;
    }

    pub fn is_keep_whitespace_mode(&self) -> bool {
        self.keep_whitespace_mode
    }

    /// Return comments as `comment` tokens instead of skipping them.
    pub fn set_keep_comment_mode(&mut self, val: bool) {
        self.keep_comment_mode = val;
    }

    /// While true, a newline produces `eom` instead of being skipped.
    pub fn set_parsing_preprocessor_directive(&mut self, val: bool) {
        self.parsing_preprocessor_directive = val;
    }

    pub fn is_parsing_preprocessor_directive(&self) -> bool {
        self.parsing_preprocessor_directive
    }

    /// While true (after `#include`), `<...>` lexes as one
    /// angle-string-literal token.
    pub fn set_parsing_filename(&mut self, val: bool) {
        self.parsing_filename = val;
    }

    pub fn miopt(&self) -> &MultipleIncludeOpt {
        &self.miopt
    }

    pub fn miopt_mut(&mut self) -> &mut MultipleIncludeOpt {
        &mut self.miopt
    }

    pub fn push_conditional_level(&mut self, info: PPConditionalInfo) {
        self.conditional_stack.push(info);
    }

    pub fn pop_conditional_level(&mut self) -> Option<PPConditionalInfo> {
        self.conditional_stack.pop()
    }

    pub fn peek_conditional_level_mut(&mut self) -> Option<&mut PPConditionalInfo> {
        self.conditional_stack.last_mut()
    }

    pub fn conditional_stack_depth(&self) -> usize {
        self.conditional_stack.len()
    }

    /// Lex one token with full identifier classification.
    pub fn lex(
        &mut self,
        sm: &SourceManager,
        diags: &mut DiagnosticsEngine,
        identifiers: &mut IdentifierTable,
        tok: &mut Token,
    ) {
        debug_assert!(!self.lexing_raw_mode, "use lex_from_raw_lexer in raw mode");
        let mut cx = Cx { diags, identifiers };
        self.lex_internal(sm, Some(&mut cx), tok);
    }

    /// Lex one token in raw mode: no interning, no keyword mapping, no
    /// diagnostics.
    pub fn lex_from_raw_lexer(&mut self, sm: &SourceManager, tok: &mut Token) {
        debug_assert!(self.lexing_raw_mode, "raw lexing a non-raw lexer");
        self.lex_internal(sm, None, tok);
    }

    fn loc_at(&self, offset: usize) -> SourceLocation {
        SourceLocation::file_loc(self.fid, offset as u32)
    }

    fn report(
        &self,
        cx: Option<&mut Cx>,
        loc: SourceLocation,
        level: DiagnosticLevel,
        msg: impl Into<String>,
    ) {
        if self.lexing_raw_mode {
            return;
        }
        if let Some(cx) = cx {
            cx.diags.report(level, loc, msg);
        }
    }

    /// Stamp `tok` with kind, range, and the accumulated flags, and
    /// advance past it.
    fn form_token(
        &mut self,
        tok: &mut Token,
        kind: TokenKind,
        start: usize,
        end: usize,
        dirty: bool,
    ) {
        tok.set_kind(kind);
        tok.set_location(self.loc_at(start));
        tok.set_length((end - start) as u32);
        if self.is_at_start_of_line {
            tok.set_flag(Token::START_OF_LINE);
        }
        if self.has_leading_space {
            tok.set_flag(Token::LEADING_SPACE);
        }
        if dirty {
            tok.set_flag(Token::NEEDS_CLEANING);
        }
        self.is_at_start_of_line = false;
        self.has_leading_space = false;
        self.pos = end;
    }

    fn lex_internal(&mut self, sm: &SourceManager, mut cx: Option<&mut Cx>, tok: &mut Token) {
        let data = sm.buffer_data(self.fid);
        loop {
            let start = self.pos;
            let raw = data[self.pos];

            // End of buffer.
            if raw == 0 && self.pos == self.end {
                if self.parsing_preprocessor_directive {
                    self.parsing_preprocessor_directive = false;
                    self.parsing_filename = false;
                    self.form_token(tok, TokenKind::Eom, start, start, false);
                    return;
                }
                if !self.conditional_stack.is_empty() {
                    let loc = self.conditional_stack[self.conditional_stack.len() - 1].if_loc;
                    self.report(
                        cx.as_deref_mut(),
                        loc,
                        DiagnosticLevel::Error,
                        "unterminated conditional directive",
                    );
                    self.conditional_stack.clear();
                }
                self.form_token(tok, TokenKind::Eof, start, start, false);
                return;
            }

            // Real newlines: end a directive line, otherwise whitespace.
            if raw == b'\n' || raw == b'\r' {
                if self.parsing_preprocessor_directive {
                    let len = if raw == b'\r' && data[self.pos + 1] == b'\n' {
                        2
                    } else {
                        1
                    };
                    self.parsing_preprocessor_directive = false;
                    self.parsing_filename = false;
                    self.form_token(tok, TokenKind::Eom, start, start + len, false);
                    self.is_at_start_of_line = true;
                    self.has_leading_space = false;
                    return;
                }
                if self.skip_whitespace(data, tok) {
                    return;
                }
                continue;
            }

            // Horizontal whitespace.
            if raw == b' ' || raw == b'\t' || raw == 0x0b || raw == 0x0c {
                if self.skip_whitespace(data, tok) {
                    return;
                }
                continue;
            }

            // Everything else dispatches on the logical character, so a
            // token-initial trigraph or spliced line folds here.
            let mut scan = Scan::new(data, self.pos, self.lang_opts.trigraphs);
            let (c, csize) = get_char_and_size(data, scan.off, self.lang_opts.trigraphs);

            if c == 0 {
                // A splice can run straight into the end of the buffer.
                if scan.off + csize - 1 == self.end {
                    self.pos = self.end;
                    continue;
                }
                // A stray NUL inside the buffer is ignored like whitespace.
                self.report(
                    cx.as_deref_mut(),
                    self.loc_at(start),
                    DiagnosticLevel::Warning,
                    "null character ignored",
                );
                scan.bump();
                self.pos = scan.off;
                self.has_leading_space = true;
                continue;
            }

            // A splice can also lead straight to whitespace. A spliced
            // newline re-dispatches raw so directive mode still sees it.
            if c == b'\n' || c == b'\r' {
                self.pos = scan.off + csize - 1;
                self.has_leading_space = true;
                continue;
            }
            if c == b' ' || c == b'\t' || c == 0x0b || c == 0x0c {
                scan.bump();
                self.pos = scan.off;
                self.has_leading_space = true;
                continue;
            }

            // Wide literals: L"..." and L'...'.
            if c == b'L' {
                match scan.peek_second() {
                    b'"' => {
                        scan.bump();
                        scan.bump();
                        self.lex_string_literal(cx.as_deref_mut(), &mut scan, tok, start, true);
                        return;
                    }
                    b'\'' => {
                        scan.bump();
                        scan.bump();
                        self.lex_char_constant(cx.as_deref_mut(), &mut scan, tok, start);
                        return;
                    }
                    _ => {}
                }
            }

            if c.is_ascii_alphabetic() || c == b'_' {
                scan.bump();
                self.lex_identifier(data, cx.as_deref_mut(), &mut scan, tok, start);
                return;
            }

            if c.is_ascii_digit() {
                self.lex_numeric_constant(cx.as_deref_mut(), &mut scan, tok, start);
                return;
            }

            if c == b'.' && scan.peek_second().is_ascii_digit() {
                self.lex_float_constant(cx.as_deref_mut(), &mut scan, tok, start);
                return;
            }

            if c == b'\'' {
                scan.bump();
                self.lex_char_constant(cx.as_deref_mut(), &mut scan, tok, start);
                return;
            }

            if c == b'"' {
                scan.bump();
                self.lex_string_literal(cx.as_deref_mut(), &mut scan, tok, start, false);
                return;
            }

            if c == b'<' && self.parsing_filename {
                scan.bump();
                self.lex_angled_string_literal(cx.as_deref_mut(), &mut scan, tok, start);
                return;
            }

            // Comments.
            if c == b'/' {
                let second = scan.peek_second();
                if second == b'/' && self.lang_opts.bcpl_comments {
                    scan.bump();
                    scan.bump();
                    self.skip_bcpl_comment(&mut scan);
                    if self.keep_comment_mode {
                        self.form_token(tok, TokenKind::Comment, start, scan.off, scan.dirty);
                        return;
                    }
                    self.pos = scan.off;
                    self.has_leading_space = true;
                    continue;
                }
                if second == b'*' {
                    scan.bump();
                    scan.bump();
                    let closed = self.skip_block_comment(cx.as_deref_mut(), &mut scan, start);
                    if closed && self.keep_comment_mode {
                        self.form_token(tok, TokenKind::Comment, start, scan.off, scan.dirty);
                        return;
                    }
                    self.pos = scan.off;
                    self.has_leading_space = true;
                    continue;
                }
            }

            if let Some(kind) = self.lex_punctuator(&mut scan, c) {
                self.form_token(tok, kind, start, scan.off, scan.dirty);
                return;
            }

            // Unknown byte: report, consume it, and keep going.
            self.report(
                cx.as_deref_mut(),
                self.loc_at(start),
                DiagnosticLevel::Error,
                format!("unknown character {:?}", c as char),
            );
            scan.bump();
            self.pos = scan.off;
            continue;
        }
    }

    /// Skip a run of whitespace. In keep-whitespace mode the run comes
    /// back as one `unknown` token and the return value is true.
    fn skip_whitespace(&mut self, data: &[u8], tok: &mut Token) -> bool {
        let start = self.pos;
        let mut off = self.pos;
        loop {
            match data[off] {
                b' ' | b'\t' | 0x0b | 0x0c => {
                    off += 1;
                    self.has_leading_space = true;
                }
                b'\n' | b'\r' => {
                    if self.parsing_preprocessor_directive {
                        break;
                    }
                    off += 1;
                    self.is_at_start_of_line = true;
                    self.has_leading_space = false;
                }
                _ => break,
            }
        }
        if self.keep_whitespace_mode && off > start {
            self.form_token(tok, TokenKind::Unknown, start, off, false);
            return true;
        }
        self.pos = off;
        false
    }

    fn lex_identifier(
        &mut self,
        data: &[u8],
        cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
    ) {
        loop {
            let c = scan.peek();
            if c.is_ascii_alphanumeric() || c == b'_' {
                scan.bump();
            } else {
                break;
            }
        }
        let dirty = scan.dirty;
        self.form_token(tok, TokenKind::Identifier, start, scan.off, dirty);

        if self.lexing_raw_mode {
            return;
        }
        if let Some(cx) = cx {
            // Identifier bytes are ASCII, so the clean case borrows the
            // buffer directly; the dirty case re-reads through cleaning.
            let id = match std::str::from_utf8(&data[start..scan.off]) {
                Ok(name) if !dirty => cx.identifiers.get(name),
                _ => {
                    let name = clean_range(data, start, scan.off, self.lang_opts.trigraphs);
                    cx.identifiers.get(&name)
                }
            };
            tok.set_ident(id);
            // Keyword registration retags the kind through the info.
            tok.set_kind(cx.identifiers.info(id).token_kind());
        }
    }

    fn lex_numeric_constant(
        &mut self,
        cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
    ) {
        let first = scan.bump();
        let mut base = 10;
        if first == b'0' {
            match scan.peek() {
                b'x' | b'X' => {
                    base = 16;
                    scan.bump();
                    while scan.peek().is_ascii_hexdigit() {
                        scan.bump();
                    }
                }
                _ => {
                    base = 8;
                    while matches!(scan.peek(), b'0'..=b'7') {
                        scan.bump();
                    }
                }
            }
        } else {
            while scan.peek().is_ascii_digit() {
                scan.bump();
            }
        }

        // A period or exponent letter hands the whole token over to the
        // floating-point scanner, re-reading from the original start.
        let next = scan.peek();
        if next == b'.'
            || ((next == b'e' || next == b'E') && base != 16)
            || ((next == b'p' || next == b'P') && base == 16)
        {
            let mut fscan = Scan::new(scan.data, start, self.lang_opts.trigraphs);
            self.lex_float_constant(cx, &mut fscan, tok, start);
            return;
        }

        // Suffixes: [uU] and one or two [lL], in either order.
        let mut unsigned_seen = false;
        let mut long_count = 0;
        loop {
            match scan.peek() {
                b'u' | b'U' if !unsigned_seen => {
                    unsigned_seen = true;
                    scan.bump();
                }
                c @ (b'l' | b'L') if long_count == 0 => {
                    long_count = 1;
                    scan.bump();
                    if scan.peek() == c {
                        long_count = 2;
                        scan.bump();
                    }
                }
                _ => break,
            }
        }

        let kind = match (unsigned_seen, long_count) {
            (false, 0) => TokenKind::IntConst,
            (true, 0) => TokenKind::UIntConst,
            (false, 1) => TokenKind::LongConst,
            (true, 1) => TokenKind::ULongConst,
            (false, 2) => TokenKind::LongLongConst,
            (true, 2) => TokenKind::ULongLongConst,
            _ => unreachable!(),
        };
        self.form_token(tok, kind, start, scan.off, scan.dirty);
    }

    /// Floating constants, decimal or hex, scanned from the token start.
    fn lex_float_constant(
        &mut self,
        mut cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
    ) {
        let hex = scan.peek() == b'0' && matches!(scan.peek_second(), b'x' | b'X');
        if hex {
            scan.bump();
            scan.bump();
        }
        let digit_ok = |c: u8| {
            if hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        };

        while digit_ok(scan.peek()) {
            scan.bump();
        }
        if scan.peek() == b'.' {
            scan.bump();
            while digit_ok(scan.peek()) {
                scan.bump();
            }
        }

        let mut saw_exponent = false;
        let exp_letter = if hex { b'p' } else { b'e' };
        let c = scan.peek();
        if c == exp_letter || c == exp_letter.to_ascii_uppercase() {
            let mut probe = *scan;
            probe.bump();
            if probe.peek() == b'+' || probe.peek() == b'-' {
                probe.bump();
            }
            if probe.peek().is_ascii_digit() {
                while probe.peek().is_ascii_digit() {
                    probe.bump();
                }
                *scan = probe;
                saw_exponent = true;
            }
        }

        if hex && !saw_exponent {
            self.report(
                cx.as_deref_mut(),
                self.loc_at(start),
                DiagnosticLevel::Error,
                "hexadecimal floating constant requires an exponent",
            );
        }
        if hex && !self.lang_opts.hex_floats {
            self.report(
                cx.as_deref_mut(),
                self.loc_at(start),
                DiagnosticLevel::Extension,
                "hexadecimal floating constants are a C99 feature",
            );
        }

        let kind = match scan.peek() {
            b'f' | b'F' => {
                scan.bump();
                TokenKind::FloatConst
            }
            b'l' | b'L' => {
                scan.bump();
                TokenKind::LongDoubleConst
            }
            _ => TokenKind::DoubleConst,
        };
        self.form_token(tok, kind, start, scan.off, scan.dirty);
    }

    /// One character (with escape) between single quotes, emitted as an
    /// integer constant. A NUL byte terminates the literal like a
    /// newline does; embedded NULs are not representable.
    fn lex_char_constant(
        &mut self,
        mut cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
    ) {
        let c = scan.peek();
        if c == b'\n' || c == b'\r' || c == 0 {
            self.report(
                cx.as_deref_mut(),
                self.loc_at(start),
                DiagnosticLevel::Error,
                "unclosed char literal",
            );
            self.form_token(tok, TokenKind::Unknown, start, scan.off, scan.dirty);
            return;
        }

        if c == b'\\' {
            scan.bump();
            if scan.peek() != 0 || scan.off != self.end {
                scan.bump();
            }
        } else {
            scan.bump();
        }

        if scan.peek() == b'\'' {
            scan.bump();
            self.form_token(tok, TokenKind::CharConst, start, scan.off, scan.dirty);
            return;
        }

        self.report(
            cx.as_deref_mut(),
            self.loc_at(start),
            DiagnosticLevel::Error,
            "char literal too long",
        );
        // Recover at the closing quote or the end of the line.
        loop {
            let c = scan.peek();
            if c == b'\'' {
                scan.bump();
                break;
            }
            if c == b'\n' || c == b'\r' || (c == 0 && scan.off == self.end) {
                break;
            }
            scan.bump();
        }
        self.form_token(tok, TokenKind::Unknown, start, scan.off, scan.dirty);
    }

    /// Bytes (with escapes) until the closing quote on the same logical
    /// line.
    fn lex_string_literal(
        &mut self,
        cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
        wide: bool,
    ) {
        loop {
            let c = scan.peek();
            if c == b'"' {
                scan.bump();
                let kind = if wide {
                    TokenKind::WideStringLiteral
                } else {
                    TokenKind::StringLiteral
                };
                self.form_token(tok, kind, start, scan.off, scan.dirty);
                return;
            }
            if c == b'\n' || c == b'\r' || (c == 0 && scan.off == self.end) {
                self.report(
                    cx,
                    self.loc_at(start),
                    DiagnosticLevel::Error,
                    "unclosed string literal",
                );
                self.form_token(tok, TokenKind::Unknown, start, scan.off, scan.dirty);
                return;
            }
            if c == b'\\' {
                scan.bump();
                if scan.peek() != 0 || scan.off != self.end {
                    scan.bump();
                }
            } else {
                scan.bump();
            }
        }
    }

    /// `<path>` after `#include`.
    fn lex_angled_string_literal(
        &mut self,
        cx: Option<&mut Cx>,
        scan: &mut Scan,
        tok: &mut Token,
        start: usize,
    ) {
        loop {
            let c = scan.peek();
            if c == b'>' {
                scan.bump();
                self.form_token(tok, TokenKind::AngleStringLiteral, start, scan.off, scan.dirty);
                return;
            }
            if c == b'\n' || c == b'\r' || (c == 0 && scan.off == self.end) {
                self.report(
                    cx,
                    self.loc_at(start),
                    DiagnosticLevel::Error,
                    "unclosed string literal",
                );
                self.form_token(tok, TokenKind::Unknown, start, scan.off, scan.dirty);
                return;
            }
            if c == b'\\' {
                scan.bump();
                if scan.peek() != 0 || scan.off != self.end {
                    scan.bump();
                }
            } else {
                scan.bump();
            }
        }
    }

    /// `//` to the next real newline. A spliced newline continues the
    /// comment.
    fn skip_bcpl_comment(&mut self, scan: &mut Scan) {
        loop {
            let c = scan.peek();
            if c == b'\n' || c == b'\r' || (c == 0 && scan.off == self.end) {
                return;
            }
            scan.bump();
        }
    }

    /// `/*` to `*/`, non-nesting. Returns false when the comment ran
    /// into end of buffer (reported, recovered at EOF).
    fn skip_block_comment(&mut self, cx: Option<&mut Cx>, scan: &mut Scan, start: usize) -> bool {
        loop {
            let c = scan.peek();
            if c == 0 && scan.off == self.end {
                self.report(
                    cx,
                    self.loc_at(start),
                    DiagnosticLevel::Error,
                    "unclosed multicomment",
                );
                return false;
            }
            scan.bump();
            if c == b'*' && scan.peek() == b'/' {
                scan.bump();
                return true;
            }
        }
    }

    /// Greedy maximal-munch over the punctuator alphabet. The first
    /// character is at the cursor, unconsumed.
    fn lex_punctuator(&mut self, scan: &mut Scan, c: u8) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match c {
            b'[' => {
                scan.bump();
                LSquare
            }
            b']' => {
                scan.bump();
                RSquare
            }
            b'(' => {
                scan.bump();
                LParen
            }
            b')' => {
                scan.bump();
                RParen
            }
            b'{' => {
                scan.bump();
                LBrace
            }
            b'}' => {
                scan.bump();
                RBrace
            }
            b'.' => {
                scan.bump();
                if scan.peek() == b'.' && scan.peek_second() == b'.' {
                    scan.bump();
                    scan.bump();
                    Ellipsis
                } else {
                    Period
                }
            }
            b'&' => {
                scan.bump();
                match scan.peek() {
                    b'&' => {
                        scan.bump();
                        AmpAmp
                    }
                    b'=' => {
                        scan.bump();
                        AmpEqual
                    }
                    _ => Amp,
                }
            }
            b'*' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    StarEqual
                } else {
                    Star
                }
            }
            b'+' => {
                scan.bump();
                match scan.peek() {
                    b'+' => {
                        scan.bump();
                        PlusPlus
                    }
                    b'=' => {
                        scan.bump();
                        PlusEqual
                    }
                    _ => Plus,
                }
            }
            b'-' => {
                scan.bump();
                match scan.peek() {
                    b'-' => {
                        scan.bump();
                        MinusMinus
                    }
                    b'=' => {
                        scan.bump();
                        MinusEqual
                    }
                    b'>' => {
                        scan.bump();
                        Arrow
                    }
                    _ => Minus,
                }
            }
            b'~' => {
                scan.bump();
                Tilde
            }
            b'!' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    ExclaimEqual
                } else {
                    Exclaim
                }
            }
            b'/' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    SlashEqual
                } else {
                    Slash
                }
            }
            b'%' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    PercentEqual
                } else {
                    Percent
                }
            }
            b'<' => {
                scan.bump();
                match scan.peek() {
                    b'<' => {
                        scan.bump();
                        if scan.peek() == b'=' {
                            scan.bump();
                            LessLessEqual
                        } else {
                            LessLess
                        }
                    }
                    b'=' => {
                        scan.bump();
                        LessEqual
                    }
                    _ => Less,
                }
            }
            b'>' => {
                scan.bump();
                match scan.peek() {
                    b'>' => {
                        scan.bump();
                        if scan.peek() == b'=' {
                            scan.bump();
                            GreaterGreaterEqual
                        } else {
                            GreaterGreater
                        }
                    }
                    b'=' => {
                        scan.bump();
                        GreaterEqual
                    }
                    _ => Greater,
                }
            }
            b'^' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    CaretEqual
                } else {
                    Caret
                }
            }
            b'|' => {
                scan.bump();
                match scan.peek() {
                    b'|' => {
                        scan.bump();
                        PipePipe
                    }
                    b'=' => {
                        scan.bump();
                        PipeEqual
                    }
                    _ => Pipe,
                }
            }
            b'?' => {
                scan.bump();
                Question
            }
            b':' => {
                scan.bump();
                Colon
            }
            b';' => {
                scan.bump();
                Semi
            }
            b'=' => {
                scan.bump();
                if scan.peek() == b'=' {
                    scan.bump();
                    EqualEqual
                } else {
                    Equal
                }
            }
            b',' => {
                scan.bump();
                Comma
            }
            b'#' => {
                scan.bump();
                if scan.peek() == b'#' {
                    scan.bump();
                    HashHash
                } else {
                    Hash
                }
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Re-lex the token starting at `loc` to find its byte length.
    pub fn measure_token_length(
        loc: SourceLocation,
        sm: &SourceManager,
        opts: &LangOptions,
    ) -> u32 {
        let (fid, offset) = sm.decomposed_loc(loc);
        let mut lexer = Lexer::new_raw_at(fid, offset as usize, sm, opts);
        let mut tok = Token::new();
        lexer.lex_from_raw_lexer(sm, &mut tok);
        if tok.is(TokenKind::Eof) {
            0
        } else {
            tok.length()
        }
    }
}

/// True for bytes that can never begin a trigraph or escaped newline;
/// such characters are their own spelling.
pub fn is_obviously_simple_character(b: u8) -> bool {
    b != b'?' && b != b'\\'
}

/// The length of the newline sequence at `off`, if the bytes there form
/// one (`\n`, `\r`, `\r\n`, `\n\r`).
fn newline_seq_len(data: &[u8], off: usize) -> Option<usize> {
    match data.get(off).copied() {
        Some(b'\n') => Some(if data.get(off + 1) == Some(&b'\r') { 2 } else { 1 }),
        Some(b'\r') => Some(if data.get(off + 1) == Some(&b'\n') { 2 } else { 1 }),
        _ => None,
    }
}

fn trigraph_char(b: u8) -> Option<u8> {
    Some(match b {
        b'=' => b'#',
        b'(' => b'[',
        b'/' => b'\\',
        b')' => b']',
        b'\'' => b'^',
        b'<' => b'{',
        b'!' => b'|',
        b'>' => b'}',
        b'-' => b'~',
        _ => return None,
    })
}

/// Read the logical character at `off`, folding escaped newlines and
/// (when enabled) trigraphs. Returns the character and the number of
/// raw bytes it occupies.
fn get_char_and_size(data: &[u8], off: usize, trigraphs: bool) -> (u8, usize) {
    let b = data[off];
    if is_obviously_simple_character(b) {
        return (b, 1);
    }

    if b == b'\\' {
        if let Some(nl) = newline_seq_len(data, off + 1) {
            let (c, size) = get_char_and_size(data, off + 1 + nl, trigraphs);
            return (c, 1 + nl + size);
        }
        return (b'\\', 1);
    }

    // '?': maybe a trigraph.
    if trigraphs && data.get(off + 1) == Some(&b'?') {
        if let Some(t) = data.get(off + 2).copied().and_then(trigraph_char) {
            if t == b'\\' {
                // The `??/` trigraph can itself form an escaped newline.
                if let Some(nl) = newline_seq_len(data, off + 3) {
                    let (c, size) = get_char_and_size(data, off + 3 + nl, trigraphs);
                    return (c, 3 + nl + size);
                }
            }
            return (t, 3);
        }
    }
    (b'?', 1)
}

/// The cleaning reader used by spelling reconstruction; identical to
/// the lexer's own reader and guaranteed not to emit diagnostics.
pub fn get_char_and_size_no_warn(data: &[u8], off: usize, trigraphs: bool) -> (u8, usize) {
    get_char_and_size(data, off, trigraphs)
}

/// Skip any escaped newlines at `off`, returning the offset of the
/// first byte that is not part of a splice.
pub fn skip_escaped_newlines(data: &[u8], mut off: usize, trigraphs: bool) -> usize {
    loop {
        if data.get(off) == Some(&b'\\') {
            if let Some(nl) = newline_seq_len(data, off + 1) {
                off += 1 + nl;
                continue;
            }
        }
        if trigraphs
            && data.get(off) == Some(&b'?')
            && data.get(off + 1) == Some(&b'?')
            && data.get(off + 2) == Some(&b'/')
        {
            if let Some(nl) = newline_seq_len(data, off + 3) {
                off += 3 + nl;
                continue;
            }
        }
        return off;
    }
}

/// Re-read `[start, end)` through the cleaning reader into a string.
pub(crate) fn clean_range(data: &[u8], start: usize, end: usize, trigraphs: bool) -> String {
    let mut out = String::with_capacity(end - start);
    let mut off = start;
    while off < end {
        let (c, size) = get_char_and_size(data, off, trigraphs);
        out.push(c as char);
        off += size;
    }
    out
}
