//! Language dialect options

use serde::{Deserialize, Serialize};

/// Language dialect switches consulted by the lexer and keyword table.
///
/// All fields are plain flags; there are no hidden interactions beyond
/// the keyword gating in `IdentifierTable::add_keywords`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LangOptions {
    /// C99 mode: enables `inline`, `restrict`, `_Complex`, `_Imaginary`.
    pub c99: bool,
    /// Allow `//` comments.
    pub bcpl_comments: bool,
    /// Recognize `_Bool` as a keyword.
    pub bool_keyword: bool,
    /// Allow hexadecimal floating constants (`0x1.8p1`).
    pub hex_floats: bool,
    /// Expand `??X` trigraph sequences.
    pub trigraphs: bool,
    /// Plain `char` is signed.
    pub char_is_signed: bool,
    /// Permit implicit `int` declarations.
    pub implicit_int: bool,
}

impl LangOptions {
    /// The dialect the driver compiles by default: C99 with BCPL
    /// comments, `_Bool`, hex floats, signed `char`, and implicit int.
    pub fn c99_defaults() -> Self {
        Self {
            c99: true,
            bcpl_comments: true,
            bool_keyword: true,
            hex_floats: true,
            trigraphs: false,
            char_is_signed: true,
            implicit_int: true,
        }
    }
}
