//! Token type
//!
//! A token is by-value and short-lived: the kind, the location of its
//! first byte, the byte length of its spelling, a small flag set, and a
//! kind-dependent data channel.

use cptoyc_basic::{IdentId, SourceLocation, SourceRange, TokenKind};

/// Kind-dependent side channel of a token.
///
/// Identifier-like kinds reference the interned identifier; literal
/// kinds may reference where their bytes live (set for scratch tokens,
/// absent for tokens whose spelling is at their own location);
/// annotation tokens store the end of the range they cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenData {
    #[default]
    None,
    Ident(IdentId),
    Literal(SourceLocation),
    Annotation {
        end: SourceLocation,
    },
}

/// One lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    location: SourceLocation,
    length: u32,
    flags: u8,
    data: TokenData,
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl Token {
    /// At start of line, or only after whitespace.
    pub const START_OF_LINE: u8 = 0x01;
    /// Whitespace exists before this token.
    pub const LEADING_SPACE: u8 = 0x02;
    /// This identifier may never be macro expanded.
    pub const DISABLE_EXPAND: u8 = 0x04;
    /// Contained an escaped newline or trigraph; the raw byte range is
    /// not the logical spelling.
    pub const NEEDS_CLEANING: u8 = 0x08;

    pub fn new() -> Self {
        Self {
            kind: TokenKind::Unknown,
            location: SourceLocation::invalid(),
            length: 0,
            flags: 0,
            data: TokenData::None,
        }
    }

    /// Reset to a fresh `Unknown` token with no flags or data.
    pub fn start_token(&mut self) {
        *self = Self::new();
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_not(&self, kind: TokenKind) -> bool {
        self.kind != kind
    }

    pub fn is_literal(&self) -> bool {
        self.kind.is_literal()
    }

    pub fn is_annotation(&self) -> bool {
        self.kind.is_annotation()
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn set_location(&mut self, loc: SourceLocation) {
        self.location = loc;
    }

    /// Byte count of the spelling. Annotation tokens have no length.
    pub fn length(&self) -> u32 {
        debug_assert!(!self.is_annotation(), "annotation tokens have no length");
        self.length
    }

    pub fn set_length(&mut self, len: u32) {
        debug_assert!(!self.is_annotation(), "annotation tokens have no length");
        self.length = len;
    }

    /// The interned identifier behind an identifier-like token; `None`
    /// for literal and annotation kinds.
    pub fn ident(&self) -> Option<IdentId> {
        match self.data {
            TokenData::Ident(id) if !self.is_literal() && !self.is_annotation() => Some(id),
            _ => None,
        }
    }

    pub fn set_ident(&mut self, id: IdentId) {
        debug_assert!(
            !self.is_literal() && !self.is_annotation(),
            "identifier data on a literal or annotation token"
        );
        self.data = TokenData::Ident(id);
    }

    /// Where a literal's bytes begin, when they live away from the
    /// token's own location (scratch tokens).
    pub fn literal_loc(&self) -> Option<SourceLocation> {
        debug_assert!(self.is_literal(), "literal data of a non-literal token");
        match self.data {
            TokenData::Literal(loc) => Some(loc),
            _ => None,
        }
    }

    pub fn set_literal_loc(&mut self, loc: SourceLocation) {
        debug_assert!(self.is_literal(), "literal data of a non-literal token");
        self.data = TokenData::Literal(loc);
    }

    pub fn annotation_end(&self) -> SourceLocation {
        debug_assert!(self.is_annotation(), "annotation end of a plain token");
        match self.data {
            TokenData::Annotation { end } => end,
            _ => SourceLocation::invalid(),
        }
    }

    pub fn set_annotation_end(&mut self, end: SourceLocation) {
        debug_assert!(self.is_annotation(), "annotation end of a plain token");
        self.data = TokenData::Annotation { end };
    }

    /// The range of tokens an annotation token stands for.
    pub fn annotation_range(&self) -> SourceRange {
        SourceRange::new(self.location(), self.annotation_end())
    }

    pub fn set_annotation_range(&mut self, range: SourceRange) {
        self.set_location(range.begin());
        self.set_annotation_end(range.end());
    }

    pub fn set_flag(&mut self, flag: u8) {
        self.flags |= flag;
    }

    pub fn clear_flag(&mut self, flag: u8) {
        self.flags &= !flag;
    }

    pub fn set_flag_value(&mut self, flag: u8, val: bool) {
        if val {
            self.set_flag(flag);
        } else {
            self.clear_flag(flag);
        }
    }

    /// The raw flag bits, for low-level comparisons.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_at_start_of_line(&self) -> bool {
        self.flags & Self::START_OF_LINE != 0
    }

    pub fn has_leading_space(&self) -> bool {
        self.flags & Self::LEADING_SPACE != 0
    }

    pub fn is_expand_disabled(&self) -> bool {
        self.flags & Self::DISABLE_EXPAND != 0
    }

    /// True if the raw byte range contains trigraphs or escaped
    /// newlines and must be cleaned to yield the spelling.
    pub fn needs_cleaning(&self) -> bool {
        self.flags & Self::NEEDS_CLEANING != 0
    }

    /// The internal name of this token's kind.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Information about one open conditional (`#if`/`#ifdef`/`#ifndef`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PPConditionalInfo {
    /// Location where the conditional started.
    pub if_loc: SourceLocation,
    /// True if this conditional sits inside a skipping region.
    pub was_skipping: bool,
    /// True once a branch of this conditional has produced tokens.
    pub found_non_skip: bool,
    /// True after `#else`; further `#elif`/`#else` are invalid.
    pub found_else: bool,
}
