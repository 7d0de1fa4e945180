//! Multiple-include optimizer
//!
//! Detects the `#ifndef X` / `#define X` / ... / `#endif` idiom wrapping
//! a whole file, so repeated inclusion of an idempotent header can be
//! skipped without re-lexing it. The detector moves through the states
//! not-started, reading-header-macro, saw-define-of-header-macro, and
//! disabled; any token or directive outside the idiom disables it.

use cptoyc_basic::IdentId;

#[derive(Debug, Default)]
pub struct MultipleIncludeOpt {
    /// Any token has been read outside the guard structure.
    read_any_tokens: bool,
    /// A macro expanded before the guard could be established.
    did_macro_expansion: bool,
    /// The candidate controlling macro from a top-level `#ifndef`.
    the_macro: Option<IdentId>,
    /// The controlling macro has been `#define`d.
    saw_define: bool,
}

impl MultipleIncludeOpt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permanently disable the optimization for this file.
    pub fn invalidate(&mut self) {
        self.read_any_tokens = true;
        self.the_macro = None;
        self.saw_define = false;
    }

    /// True once any token has been read (used to reject `#ifndef`
    /// guards that are not the first thing in the file).
    pub fn has_read_any_tokens(&self) -> bool {
        self.read_any_tokens
    }

    /// Called for every token returned to the consumer.
    pub fn read_token(&mut self) {
        self.read_any_tokens = true;
    }

    /// Called when a macro expands while lexing a directive line.
    pub fn expanded_macro(&mut self) {
        self.did_macro_expansion = true;
    }

    /// A top-level `#ifndef M` was seen. Becomes the guard candidate
    /// only if nothing else has happened in the file yet.
    pub fn enter_top_level_ifndef(&mut self, macro_id: IdentId) {
        if self.did_macro_expansion || self.read_any_tokens || self.the_macro.is_some() {
            self.invalidate();
            return;
        }
        self.the_macro = Some(macro_id);
    }

    /// Any other top-level conditional breaks the idiom.
    pub fn enter_top_level_conditional(&mut self) {
        self.invalidate();
    }

    /// A `#else`/`#elif` on the guard conditional breaks the idiom.
    pub fn found_top_level_else(&mut self) {
        self.invalidate();
    }

    /// A `#define M` was seen; records the saw-define state when `M` is
    /// the guard candidate.
    pub fn found_top_level_define(&mut self, macro_id: IdentId) {
        if self.the_macro == Some(macro_id) {
            self.saw_define = true;
        }
    }

    /// The `#endif` closing the guard; tokens after it invalidate, so
    /// the read flag resets here.
    pub fn exit_top_level_conditional(&mut self) {
        if self.the_macro.is_none() || !self.saw_define {
            self.invalidate();
            return;
        }
        self.read_any_tokens = false;
    }

    /// At end of file: the controlling macro, if the whole file turned
    /// out to be wrapped in the idiom.
    pub fn controlling_macro_at_end_of_file(&self) -> Option<IdentId> {
        if self.read_any_tokens || !self.saw_define {
            return None;
        }
        self.the_macro
    }
}
