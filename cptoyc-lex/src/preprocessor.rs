//! Preprocessor shell
//!
//! The glue that lets the lexer operate inside a translation unit: the
//! include stack, directive dispatch, identifier lookup for raw tokens,
//! spelling reconstruction, and scratch-token creation. Macro expansion
//! itself is not implemented; `#define` only records the flag that
//! routes later uses of the name through the identifier slow path, and
//! conditional branches are all taken.

use std::fmt::Write as _;

use cptoyc_basic::{
    DiagnosticLevel, DiagnosticsEngine, FileID, FileManager, IdentId, IdentifierTable,
    LangOptions, PPKeywordKind, SourceLocation, SourceManager, TokenKind,
};

use crate::lexer::{clean_range, is_obviously_simple_character, skip_escaped_newlines, Lexer};
use crate::lexer::get_char_and_size_no_warn;
use crate::scratch_buffer::ScratchBuffer;
use crate::token::{PPConditionalInfo, Token};

/// Counters kept for the driver's stat dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreprocessorStats {
    pub directives: u32,
    pub defines: u32,
    pub undefs: u32,
    pub conditionals: u32,
    pub entered_source_files: u32,
    pub max_include_stack_depth: usize,
}

/// Owns the per-translation-unit singletons and threads them through
/// the active lexer.
pub struct Preprocessor {
    lang_opts: LangOptions,
    file_mgr: FileManager,
    source_mgr: SourceManager,
    diags: DiagnosticsEngine,
    identifiers: IdentifierTable,
    scratch: ScratchBuffer,

    /// Top of the include stack.
    cur_lexer: Option<Lexer>,
    /// Suspended lexers of enclosing files.
    include_stack: Vec<Lexer>,
    /// A file resolved by `#include`, entered once its directive line
    /// is fully consumed.
    pending_include: Option<FileID>,
    /// Files that turned out to be wrapped in the `#ifndef` idiom,
    /// with their controlling macros.
    controlling_macros: Vec<(FileID, IdentId)>,

    stats: PreprocessorStats,
}

impl Preprocessor {
    pub fn new(
        lang_opts: LangOptions,
        file_mgr: FileManager,
        source_mgr: SourceManager,
        diags: DiagnosticsEngine,
    ) -> Self {
        let mut identifiers = IdentifierTable::new();
        identifiers.add_keywords(&lang_opts);
        Self {
            lang_opts,
            file_mgr,
            source_mgr,
            diags,
            identifiers,
            scratch: ScratchBuffer::new(),
            cur_lexer: None,
            include_stack: Vec::new(),
            pending_include: None,
            controlling_macros: Vec::new(),
            stats: PreprocessorStats::default(),
        }
    }

    pub fn lang_options(&self) -> &LangOptions {
        &self.lang_opts
    }

    pub fn source_manager(&self) -> &SourceManager {
        &self.source_mgr
    }

    pub fn source_manager_mut(&mut self) -> &mut SourceManager {
        &mut self.source_mgr
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.file_mgr
    }

    pub fn file_manager_mut(&mut self) -> &mut FileManager {
        &mut self.file_mgr
    }

    pub fn diagnostics(&self) -> &DiagnosticsEngine {
        &self.diags
    }

    pub fn identifier_table(&self) -> &IdentifierTable {
        &self.identifiers
    }

    pub fn identifier_table_mut(&mut self) -> &mut IdentifierTable {
        &mut self.identifiers
    }

    pub fn stats(&self) -> PreprocessorStats {
        self.stats
    }

    /// Files detected as idempotent (`#ifndef` guard around the whole
    /// file), with their controlling macros.
    pub fn controlling_macros(&self) -> &[(FileID, IdentId)] {
        &self.controlling_macros
    }

    /// Push the initial frame for the registered main file. Re-entering
    /// the main file is a precondition violation.
    pub fn enter_main_source_file(&mut self) {
        assert_eq!(
            self.stats.entered_source_files, 0,
            "cannot re-enter the main file"
        );
        let fid = self.source_mgr.main_file_id();
        assert!(fid.is_valid(), "no main file registered");
        self.enter_source_file(fid);
    }

    /// Suspend the current lexer and start lexing `fid`.
    pub fn enter_source_file(&mut self, fid: FileID) {
        if let Some(prev) = self.cur_lexer.take() {
            self.include_stack.push(prev);
        }
        self.cur_lexer = Some(Lexer::new(fid, &self.source_mgr, &self.lang_opts));
        self.stats.entered_source_files += 1;
        let depth = self.include_stack.len() + 1;
        if depth > self.stats.max_include_stack_depth {
            self.stats.max_include_stack_depth = depth;
        }
    }

    /// Produce the next token of the translation unit, dispatching to
    /// the top-of-stack lexer, handling directives, and popping the
    /// stack at end of file.
    pub fn lex(&mut self, tok: &mut Token) {
        loop {
            tok.start_token();
            if self.cur_lexer.is_none() {
                tok.set_kind(TokenKind::Eof);
                return;
            }
            self.lex_unexpanded(tok);

            match tok.kind() {
                TokenKind::Hash if tok.is_at_start_of_line() => {
                    self.handle_directive();
                    if let Some(fid) = self.pending_include.take() {
                        self.enter_source_file(fid);
                    }
                    continue;
                }
                TokenKind::Eof => {
                    if let Some(lexer) = &self.cur_lexer {
                        if let Some(guard) = lexer.miopt().controlling_macro_at_end_of_file() {
                            self.controlling_macros.push((lexer.file_id(), guard));
                        }
                    }
                    match self.include_stack.pop() {
                        Some(parent) => {
                            self.cur_lexer = Some(parent);
                            continue;
                        }
                        None => {
                            self.cur_lexer = None;
                            return;
                        }
                    }
                }
                _ => {
                    if let Some(id) = tok.ident() {
                        if self.identifiers.info(id).needs_handling() {
                            self.handle_identifier(tok);
                        }
                    }
                    if let Some(lexer) = self.cur_lexer.as_mut() {
                        lexer.miopt_mut().read_token();
                    }
                    return;
                }
            }
        }
    }

    /// One raw dispatch to the current lexer, without directive or
    /// end-of-file processing.
    fn lex_unexpanded(&mut self, tok: &mut Token) {
        let Self {
            cur_lexer,
            source_mgr,
            diags,
            identifiers,
            ..
        } = self;
        match cur_lexer.as_mut() {
            Some(lexer) => lexer.lex(source_mgr, diags, identifiers, tok),
            None => tok.set_kind(TokenKind::Eof),
        }
    }

    // ========================================================================
    // DIRECTIVE HANDLING
    // ========================================================================

    fn handle_directive(&mut self) {
        self.stats.directives += 1;
        let Some(lexer) = self.cur_lexer.as_mut() else {
            return;
        };
        lexer.set_parsing_preprocessor_directive(true);

        let mut tok = Token::new();
        self.lex_unexpanded(&mut tok);
        if tok.is(TokenKind::Eom) || tok.is(TokenKind::Eof) {
            return; // null directive: "#" alone on its line
        }

        let pp_kind = tok
            .ident()
            .map(|id| self.identifiers.info(id).pp_keyword_kind())
            .unwrap_or(PPKeywordKind::NotKeyword);

        match pp_kind {
            PPKeywordKind::Include | PPKeywordKind::IncludeNext | PPKeywordKind::Import => {
                self.handle_include_directive(&mut tok)
            }
            PPKeywordKind::Define => self.handle_define_directive(&mut tok),
            PPKeywordKind::Undef => self.handle_undef_directive(&mut tok),
            PPKeywordKind::If | PPKeywordKind::Ifdef => self.handle_if_directive(&mut tok),
            PPKeywordKind::Ifndef => self.handle_ifndef_directive(&mut tok),
            PPKeywordKind::Elif | PPKeywordKind::Else => self.handle_else_directive(&mut tok),
            PPKeywordKind::Endif => self.handle_endif_directive(&mut tok),
            PPKeywordKind::Line | PPKeywordKind::Pragma => self.discard_until_eom(&mut tok),
            PPKeywordKind::Error => {
                self.handle_user_diagnostic(&mut tok, DiagnosticLevel::Error)
            }
            PPKeywordKind::Warning => {
                self.handle_user_diagnostic(&mut tok, DiagnosticLevel::Warning)
            }
            PPKeywordKind::Defined | PPKeywordKind::NotKeyword => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    tok.location(),
                    "invalid preprocessing directive",
                );
                self.discard_until_eom(&mut tok);
            }
        }
    }

    /// Swallow the rest of the directive line, through its `eom`.
    fn discard_until_eom(&mut self, tok: &mut Token) {
        while tok.is_not(TokenKind::Eom) && tok.is_not(TokenKind::Eof) {
            tok.start_token();
            self.lex_unexpanded(tok);
        }
    }

    /// `#include`: lex the filename with angle-literal mode on, resolve
    /// it through the file manager, and queue the file for entry once
    /// the directive line ends. Search paths are out of scope; names
    /// resolve as given.
    fn handle_include_directive(&mut self, tok: &mut Token) {
        if let Some(lexer) = self.cur_lexer.as_mut() {
            lexer.set_parsing_filename(true);
        }
        tok.start_token();
        self.lex_unexpanded(tok);
        if let Some(lexer) = self.cur_lexer.as_mut() {
            lexer.set_parsing_filename(false);
        }

        let include_loc = tok.location();
        let filename = match tok.kind() {
            TokenKind::StringLiteral | TokenKind::AngleStringLiteral => {
                let spelling = self.get_spelling(tok);
                if spelling.len() < 2 {
                    self.diags.report(
                        DiagnosticLevel::Error,
                        include_loc,
                        "empty filename in #include",
                    );
                    self.discard_until_eom(tok);
                    return;
                }
                spelling[1..spelling.len() - 1].to_string()
            }
            TokenKind::Eom | TokenKind::Eof => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    include_loc,
                    "expected \"FILENAME\" or <FILENAME> after #include",
                );
                return;
            }
            _ => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    include_loc,
                    "expected \"FILENAME\" or <FILENAME> after #include",
                );
                self.discard_until_eom(tok);
                return;
            }
        };
        self.discard_until_eom(tok);

        let entry = match self.file_mgr.get_file(&filename) {
            Some(entry) => entry.clone(),
            None => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    include_loc,
                    format!("'{filename}' file not found"),
                );
                return;
            }
        };
        match self.source_mgr.create_file_id(&entry, include_loc) {
            Ok(fid) => self.pending_include = Some(fid),
            Err(e) => {
                self.diags
                    .report(DiagnosticLevel::Error, include_loc, e.to_string());
            }
        }
    }

    /// `#define NAME ...`: record the macro flag on the identifier; the
    /// replacement list is skipped (expansion is out of scope).
    fn handle_define_directive(&mut self, tok: &mut Token) {
        tok.start_token();
        self.lex_unexpanded(tok);
        match tok.ident() {
            Some(id) => {
                self.identifiers.info_mut(id).set_has_macro_definition(true);
                self.stats.defines += 1;
                if let Some(lexer) = self.cur_lexer.as_mut() {
                    if lexer.conditional_stack_depth() == 1 {
                        lexer.miopt_mut().found_top_level_define(id);
                    }
                }
            }
            None => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    tok.location(),
                    "macro names must be identifiers",
                );
            }
        }
        self.discard_until_eom(tok);
    }

    fn handle_undef_directive(&mut self, tok: &mut Token) {
        tok.start_token();
        self.lex_unexpanded(tok);
        match tok.ident() {
            Some(id) => {
                self.identifiers
                    .info_mut(id)
                    .set_has_macro_definition(false);
                self.stats.undefs += 1;
            }
            None => {
                self.diags.report(
                    DiagnosticLevel::Error,
                    tok.location(),
                    "macro names must be identifiers",
                );
            }
        }
        self.discard_until_eom(tok);
    }

    /// `#if` / `#ifdef`: with no macro evaluation every branch is taken;
    /// the conditional is tracked for `#endif` matching and the
    /// multiple-include optimizer.
    fn handle_if_directive(&mut self, tok: &mut Token) {
        self.stats.conditionals += 1;
        if let Some(lexer) = self.cur_lexer.as_mut() {
            if lexer.conditional_stack_depth() == 0 {
                lexer.miopt_mut().enter_top_level_conditional();
            }
            lexer.push_conditional_level(PPConditionalInfo {
                if_loc: tok.location(),
                was_skipping: false,
                found_non_skip: true,
                found_else: false,
            });
        }
        self.discard_until_eom(tok);
    }

    fn handle_ifndef_directive(&mut self, tok: &mut Token) {
        self.stats.conditionals += 1;
        let if_loc = tok.location();
        tok.start_token();
        self.lex_unexpanded(tok);
        let macro_id = tok.ident();
        if let Some(lexer) = self.cur_lexer.as_mut() {
            if lexer.conditional_stack_depth() == 0 {
                match macro_id {
                    Some(id) => lexer.miopt_mut().enter_top_level_ifndef(id),
                    None => lexer.miopt_mut().invalidate(),
                }
            }
            lexer.push_conditional_level(PPConditionalInfo {
                if_loc,
                was_skipping: false,
                found_non_skip: true,
                found_else: false,
            });
        }
        self.discard_until_eom(tok);
    }

    fn handle_else_directive(&mut self, tok: &mut Token) {
        let loc = tok.location();
        let mut report_without_if = false;
        let mut report_after_else = false;
        if let Some(lexer) = self.cur_lexer.as_mut() {
            if lexer.conditional_stack_depth() == 0 {
                report_without_if = true;
            } else {
                if lexer.conditional_stack_depth() == 1 {
                    lexer.miopt_mut().found_top_level_else();
                }
                if let Some(level) = lexer.peek_conditional_level_mut() {
                    if level.found_else {
                        report_after_else = true;
                    } else {
                        level.found_else = true;
                    }
                }
            }
        }
        if report_without_if {
            self.diags
                .report(DiagnosticLevel::Error, loc, "#else without #if");
        }
        if report_after_else {
            self.diags
                .report(DiagnosticLevel::Error, loc, "#else after #else");
        }
        self.discard_until_eom(tok);
    }

    fn handle_endif_directive(&mut self, tok: &mut Token) {
        let loc = tok.location();
        let mut report_without_if = false;
        if let Some(lexer) = self.cur_lexer.as_mut() {
            match lexer.pop_conditional_level() {
                None => report_without_if = true,
                Some(_) => {
                    if lexer.conditional_stack_depth() == 0 {
                        lexer.miopt_mut().exit_top_level_conditional();
                    }
                }
            }
        }
        if report_without_if {
            self.diags
                .report(DiagnosticLevel::Error, loc, "#endif without #if");
        }
        self.discard_until_eom(tok);
    }

    /// `#error` / `#warning`: the rest of the line is the message.
    fn handle_user_diagnostic(&mut self, tok: &mut Token, level: DiagnosticLevel) {
        let loc = tok.location();
        let mut message = String::new();
        loop {
            tok.start_token();
            self.lex_unexpanded(tok);
            if tok.is(TokenKind::Eom) || tok.is(TokenKind::Eof) {
                break;
            }
            if !message.is_empty() && tok.has_leading_space() {
                message.push(' ');
            }
            message.push_str(&self.get_spelling(tok));
        }
        self.diags.report(level, loc, message);
    }

    // ========================================================================
    // IDENTIFIER AND SPELLING SERVICES
    // ========================================================================

    /// Given an identifier token lexed without interning (raw mode),
    /// resolve and install its `IdentifierInfo`, cleaning the spelling
    /// first when needed.
    pub fn look_up_identifier_info(&mut self, tok: &mut Token) -> IdentId {
        debug_assert!(
            tok.is(TokenKind::Identifier),
            "identifier lookup on a non-identifier token"
        );
        let spelling = self.get_spelling(tok);
        let id = self.identifiers.get(&spelling);
        tok.set_ident(id);
        tok.set_kind(self.identifiers.info(id).token_kind());
        id
    }

    /// The slow path for identifiers whose info demands attention.
    /// Poisoned identifiers draw an error; extension identifiers a
    /// warning; macro names would expand here if expansion were built.
    fn handle_identifier(&mut self, tok: &Token) {
        let Some(id) = tok.ident() else {
            return;
        };
        let info = self.identifiers.info(id);
        if info.is_poisoned() {
            self.diags.report(
                DiagnosticLevel::Error,
                tok.location(),
                "attempt to use a poisoned identifier",
            );
        } else if info.is_extension_token() {
            self.diags.report(
                DiagnosticLevel::Extension,
                tok.location(),
                format!("extension identifier '{}' used", info.name()),
            );
        }
    }

    /// The cleaned spelling of a token: trigraphs expanded, escaped
    /// newlines joined. For clean tokens this is the raw byte range.
    pub fn get_spelling(&self, tok: &Token) -> String {
        if let Some(id) = tok.ident() {
            return self.identifiers.info(id).name().to_string();
        }

        let start_loc = if tok.is_literal() {
            tok.literal_loc().unwrap_or_else(|| tok.location())
        } else {
            tok.location()
        };
        if start_loc.is_invalid() {
            return String::new();
        }
        let (fid, offset) = self.source_mgr.decomposed_loc(start_loc);
        let data = self.source_mgr.buffer_data(fid);
        let start = offset as usize;
        let end = start + tok.length() as usize;

        if !tok.needs_cleaning() {
            return String::from_utf8_lossy(&data[start..end]).into_owned();
        }
        let cleaned = clean_range(data, start, end, self.lang_opts.trigraphs);
        debug_assert!(
            cleaned.len() < tok.length() as usize,
            "needs-cleaning token cleaned to its own length"
        );
        cleaned
    }

    /// Plop `bytes` into the scratch buffer and build a token over them.
    /// With a valid `inst_loc` the token gets an instantiation location
    /// recording that use site.
    pub fn create_string(
        &mut self,
        bytes: &[u8],
        kind: TokenKind,
        inst_loc: SourceLocation,
    ) -> Token {
        let mut tok = Token::new();
        tok.set_kind(kind);
        tok.set_length(bytes.len() as u32);

        let spelling_loc = self.scratch.get_token(&mut self.source_mgr, bytes);
        let loc = if inst_loc.is_valid() {
            self.source_mgr.create_instantiation_loc(
                spelling_loc,
                inst_loc,
                inst_loc,
                bytes.len() as u32,
            )
        } else {
            spelling_loc
        };
        tok.set_location(loc);
        if tok.is_literal() {
            tok.set_literal_loc(spelling_loc);
        }
        tok
    }

    /// Given the start of a token, the location of character `char_no`
    /// within it, stepping over trigraphs and escaped newlines.
    pub fn advance_to_token_character(
        &self,
        tok_start: SourceLocation,
        char_no: u32,
    ) -> SourceLocation {
        let (fid, offset) = self.source_mgr.decomposed_loc(tok_start);
        let base = SourceLocation::file_loc(fid, offset);
        let data = self.source_mgr.buffer_data(fid);
        let mut phys = offset as usize;
        let mut remaining = char_no;

        if remaining == 0 && is_obviously_simple_character(data[phys]) {
            return base;
        }

        // The usual case: nothing interesting in the token.
        while is_obviously_simple_character(data[phys]) {
            if remaining == 0 {
                return base.file_loc_with_offset((phys - offset as usize) as i64);
            }
            phys += 1;
            remaining -= 1;
        }

        // Something needs folding; use the cleaning reader.
        while remaining > 0 {
            let (_, size) = get_char_and_size_no_warn(data, phys, self.lang_opts.trigraphs);
            phys += size;
            remaining -= 1;
        }

        // Landing on a splice means the character is past it.
        if !is_obviously_simple_character(data[phys]) {
            phys = skip_escaped_newlines(data, phys, self.lang_opts.trigraphs);
        }
        base.file_loc_with_offset((phys - offset as usize) as i64)
    }

    /// The location just past the end of the token at `loc`, or invalid
    /// when that is not meaningful (macro locations).
    pub fn loc_for_end_of_token(&self, loc: SourceLocation) -> SourceLocation {
        if loc.is_invalid() || !loc.is_file_id() {
            return SourceLocation::invalid();
        }
        let len = Lexer::measure_token_length(loc, &self.source_mgr, &self.lang_opts);
        self.advance_to_token_character(loc, len)
    }

    // ========================================================================
    // TOKEN DUMPING
    // ========================================================================

    /// Render one token the way `-dump-tokens` prints it.
    pub fn dump_token(&self, tok: &Token, dump_flags: bool) -> String {
        let mut out = String::new();
        let _ = write!(out, "{} '{}'", tok.name(), self.get_spelling(tok));
        if !dump_flags {
            return out;
        }
        if tok.is_at_start_of_line() {
            out.push_str(" [StartOfLine]");
        }
        if tok.has_leading_space() {
            out.push_str(" [LeadingSpace]");
        }
        if tok.is_expand_disabled() {
            out.push_str(" [ExpandDisabled]");
        }
        if tok.needs_cleaning() {
            let (fid, offset) = self.source_mgr.decomposed_loc(tok.location());
            let data = self.source_mgr.buffer_data(fid);
            let raw = &data[offset as usize..(offset + tok.length()) as usize];
            let _ = write!(out, " [UnClean='{}']", String::from_utf8_lossy(raw));
        }
        let _ = write!(out, "\tLoc=<{}>", self.format_location(tok.location()));
        out
    }

    /// `file:line:col`, with the spelling site appended for
    /// instantiation locations.
    pub fn format_location(&self, loc: SourceLocation) -> String {
        if loc.is_invalid() {
            return "<invalid loc>".to_string();
        }
        if loc.is_file_id() {
            let presumed = self.source_mgr.presumed_loc(loc);
            return format!("{}:{}:{}", presumed.filename, presumed.line, presumed.column);
        }
        let inst = self.format_location(self.source_mgr.instantiation_loc(loc));
        let spelling = self.format_location(self.source_mgr.spelling_loc(loc));
        format!("{inst} <Spelling={spelling}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cptoyc_basic::SourceBuffer;

    fn pp_for(src: &[u8]) -> Preprocessor {
        let opts = LangOptions::c99_defaults();
        let mut sm = SourceManager::new();
        sm.create_main_file_id_for_buffer(SourceBuffer::from_bytes(src, "main.c"));
        let mut pp = Preprocessor::new(
            opts,
            FileManager::new(),
            sm,
            DiagnosticsEngine::new(),
        );
        pp.enter_main_source_file();
        pp
    }

    fn drain_kinds(pp: &mut Preprocessor) -> Vec<TokenKind> {
        let mut kinds = Vec::new();
        let mut tok = Token::new();
        loop {
            pp.lex(&mut tok);
            kinds.push(tok.kind());
            if tok.is(TokenKind::Eof) {
                break;
            }
        }
        kinds
    }

    #[test]
    fn test_plain_token_stream() {
        let mut pp = pp_for(b"int x;\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_directive_tokens_are_consumed() {
        let mut pp = pp_for(b"#define X 42\nint y;\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert_eq!(pp.stats().directives, 1);
        assert_eq!(pp.stats().defines, 1);

        // The defined name now routes through the handling slow path.
        let x = pp.identifier_table_mut().get("X");
        assert!(pp.identifier_table().info(x).has_macro_definition());
        assert!(pp.identifier_table().info(x).needs_handling());
    }

    #[test]
    fn test_hash_mid_line_is_a_plain_token() {
        let mut pp = pp_for(b"a # b\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Hash,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(pp.stats().directives, 0);
    }

    #[test]
    fn test_unknown_directive_reported() {
        let mut pp = pp_for(b"#frobnicate\nx\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(kinds, vec![TokenKind::Identifier, TokenKind::Eof]);
        assert!(pp.diagnostics().has_error_occurred());
        assert!(pp.diagnostics().diagnostics()[0]
            .message
            .contains("invalid preprocessing directive"));
    }

    #[test]
    fn test_conditional_bookkeeping() {
        let mut pp = pp_for(b"#ifndef G\n#define G\nint x;\n#endif\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert_eq!(pp.stats().conditionals, 1);
        assert!(!pp.diagnostics().has_error_occurred());

        // The whole file is the #ifndef idiom: guard detected.
        assert_eq!(pp.controlling_macros().len(), 1);
        let guard = pp.controlling_macros()[0].1;
        assert_eq!(pp.identifier_table().info(guard).name(), "G");
    }

    #[test]
    fn test_guard_not_detected_with_trailing_tokens() {
        let mut pp = pp_for(b"#ifndef G\n#define G\n#endif\nint x;\n");
        drain_kinds(&mut pp);
        assert!(pp.controlling_macros().is_empty());
    }

    #[test]
    fn test_endif_without_if_reported() {
        let mut pp = pp_for(b"#endif\n");
        drain_kinds(&mut pp);
        assert!(pp.diagnostics().has_error_occurred());
    }

    #[test]
    fn test_unterminated_conditional_reported() {
        let mut pp = pp_for(b"#ifdef A\nint x;\n");
        drain_kinds(&mut pp);
        assert!(pp
            .diagnostics()
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("unterminated conditional")));
    }

    #[test]
    fn test_user_error_directive() {
        let mut pp = pp_for(b"#error bad build config\n");
        drain_kinds(&mut pp);
        let diags = pp.diagnostics().diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].level, DiagnosticLevel::Error);
        assert_eq!(diags[0].message, "bad build config");
    }

    #[test]
    fn test_include_stack() {
        use std::io::Write;
        let tmp = tempfile::tempdir().unwrap();
        let header = tmp.path().join("inc.h");
        std::fs::File::create(&header)
            .unwrap()
            .write_all(b"int from_header;\n")
            .unwrap();

        let src = format!("#include \"{}\"\nint after;\n", header.to_str().unwrap());
        let mut pp = pp_for(src.as_bytes());
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert_eq!(pp.stats().entered_source_files, 2);
        assert_eq!(pp.stats().max_include_stack_depth, 2);
        assert!(!pp.diagnostics().has_error_occurred());
    }

    #[test]
    fn test_include_missing_file_reported() {
        let mut pp = pp_for(b"#include \"no_such_file_anywhere.h\"\nint x;\n");
        let kinds = drain_kinds(&mut pp);
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwInt,
                TokenKind::Identifier,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert!(pp.diagnostics().has_error_occurred());
        assert!(pp.diagnostics().diagnostics()[0]
            .message
            .contains("file not found"));
    }

    #[test]
    fn test_poisoned_identifier_reported() {
        let mut pp = pp_for(b"gets(buf);\n");
        let id = pp.identifier_table_mut().get("gets");
        pp.identifier_table_mut().info_mut(id).set_is_poisoned(true);
        drain_kinds(&mut pp);
        assert!(pp.diagnostics().has_error_occurred());
        assert!(pp.diagnostics().diagnostics()[0]
            .message
            .contains("poisoned"));
    }

    #[test]
    fn test_spelling_equals_byte_range_when_clean() {
        let mut pp = pp_for(b"value 0x1F \"str\"\n");
        let mut tok = Token::new();
        loop {
            pp.lex(&mut tok);
            if tok.is(TokenKind::Eof) {
                break;
            }
            assert!(!tok.needs_cleaning());
            let spelling = pp.get_spelling(&tok);
            let (fid, off) = pp.source_manager().decomposed_loc(tok.location());
            let raw = &pp.source_manager().buffer_data(fid)
                [off as usize..(off + tok.length()) as usize];
            assert_eq!(spelling.as_bytes(), raw);
        }
    }

    #[test]
    fn test_spelling_cleans_escaped_newline() {
        let mut pp = pp_for(b"ab\\\ncd = 1;\n");
        let mut tok = Token::new();
        pp.lex(&mut tok);
        assert!(tok.needs_cleaning());
        assert_eq!(pp.get_spelling(&tok), "abcd");
    }

    #[test]
    fn test_look_up_identifier_info_for_raw_token() {
        let mut pp = pp_for(b"");
        let opts = *pp.lang_options();
        let mut sm = SourceManager::new();
        let fid = sm.create_file_id_for_buffer(SourceBuffer::from_bytes(b"while", "raw.c"));
        // Raw-lex a token elsewhere, then resolve it through the shell.
        let mut lexer = Lexer::new_raw(fid, &sm, &opts);
        let mut tok = Token::new();
        lexer.lex_from_raw_lexer(&sm, &mut tok);
        assert_eq!(tok.kind(), TokenKind::Identifier);
        // Swap the raw-side manager in so spelling resolution sees it.
        std::mem::swap(pp.source_manager_mut(), &mut sm);
        let id = pp.look_up_identifier_info(&mut tok);
        assert_eq!(pp.identifier_table().info(id).name(), "while");
        assert_eq!(tok.kind(), TokenKind::KwWhile);
    }

    #[test]
    fn test_create_string_in_scratch() {
        let mut pp = pp_for(b"use_site\n");
        let mut use_tok = Token::new();
        pp.lex(&mut use_tok);

        let tok = pp.create_string(b"123", TokenKind::IntConst, use_tok.location());
        assert!(tok.location().is_instantiation());
        assert_eq!(tok.length(), 3);
        assert_eq!(pp.get_spelling(&tok), "123");

        let sm = pp.source_manager();
        assert_eq!(sm.instantiation_loc(tok.location()), use_tok.location());
        let spelling_loc = tok.literal_loc().expect("scratch literal has data");
        assert_eq!(sm.buffer(sm.decomposed_loc(spelling_loc).0).name(), "<scratch space>");
    }

    #[test]
    fn test_create_string_without_use_site() {
        let mut pp = pp_for(b"");
        let tok = pp.create_string(b"9", TokenKind::IntConst, SourceLocation::invalid());
        assert!(tok.location().is_file_id());
        assert_eq!(pp.get_spelling(&tok), "9");
    }

    #[test]
    fn test_advance_to_token_character() {
        let mut pp = pp_for(b"abcdef\n");
        let mut tok = Token::new();
        pp.lex(&mut tok);
        let third = pp.advance_to_token_character(tok.location(), 2);
        assert_eq!(third.file_offset(), 2);
        let end = pp.loc_for_end_of_token(tok.location());
        assert_eq!(end.file_offset(), 6);
    }

    #[test]
    fn test_dump_token_format() {
        let mut pp = pp_for(b"int x;\n");
        let mut tok = Token::new();
        pp.lex(&mut tok);
        let dump = pp.dump_token(&tok, true);
        assert!(dump.starts_with("int 'int'"));
        assert!(dump.contains("[StartOfLine]"));
        assert!(dump.contains("Loc=<main.c:1:1>"));
    }

    #[test]
    fn test_stream_is_idempotent_across_preprocessors() {
        let src = b"#define A 1\nint main() { return A; }\n";
        let run = || {
            let mut pp = pp_for(src);
            let mut out = Vec::new();
            let mut tok = Token::new();
            loop {
                pp.lex(&mut tok);
                out.push((tok.kind(), tok.length(), tok.flags()));
                if tok.is(TokenKind::Eof) {
                    break;
                }
            }
            out
        };
        assert_eq!(run(), run());
    }
}
