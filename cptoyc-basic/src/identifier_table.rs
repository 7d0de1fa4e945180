//! Identifier interning and keyword classification
//!
//! Every identifier spelling is canonicalized to one [`IdentifierInfo`]
//! addressed by a stable [`IdentId`]. Infos live in an append-only arena
//! for the table's lifetime; the handle survives rehashing and keyword
//! retagging. Spelling equality is byte-exact.

use std::collections::HashMap;

use crate::{LangOptions, PPKeywordKind, TokenKind};

/// Stable handle for an interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentId(u32);

impl IdentId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-identifier state: keyword classification plus the flags the
/// preprocessor consults before touching a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierInfo {
    name: Box<str>,
    token_kind: TokenKind,
    has_macro: bool,
    is_extension: bool,
    is_poisoned: bool,
    needs_handle: bool,
}

impl IdentifierInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            token_kind: TokenKind::Identifier,
            has_macro: false,
            is_extension: false,
            is_poisoned: false,
            needs_handle: false,
        }
    }

    /// The interned spelling.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    /// `Identifier` for user identifiers, or the keyword kind installed
    /// by `add_keywords`.
    pub fn token_kind(&self) -> TokenKind {
        self.token_kind
    }

    pub fn set_token_kind(&mut self, kind: TokenKind) {
        self.token_kind = kind;
    }

    /// The directive keyword this spelling names after a `#`.
    pub fn pp_keyword_kind(&self) -> PPKeywordKind {
        PPKeywordKind::from_spelling(&self.name)
    }

    /// True if there is a `#define` for this identifier.
    pub fn has_macro_definition(&self) -> bool {
        self.has_macro
    }

    pub fn set_has_macro_definition(&mut self, val: bool) {
        self.has_macro = val;
        self.recompute_needs_handle();
    }

    pub fn is_extension_token(&self) -> bool {
        self.is_extension
    }

    pub fn set_is_extension_token(&mut self, val: bool) {
        self.is_extension = val;
        self.recompute_needs_handle();
    }

    /// A poisoned identifier draws an error on every use.
    pub fn is_poisoned(&self) -> bool {
        self.is_poisoned
    }

    pub fn set_is_poisoned(&mut self, val: bool) {
        self.is_poisoned = val;
        self.recompute_needs_handle();
    }

    /// Fast-path gate: true when the preprocessor must inspect tokens of
    /// this identifier at all.
    pub fn needs_handling(&self) -> bool {
        self.needs_handle
    }

    fn recompute_needs_handle(&mut self) {
        self.needs_handle = self.has_macro || self.is_extension || self.is_poisoned;
    }
}

/// Capability consulted on an interning miss, used by pre-tokenized
/// header sources to supply identifiers of their own.
pub trait IdentifierLookup {
    /// Return the info to install for `name`, or `None` if the external
    /// source does not know it.
    fn resolve(&mut self, name: &str) -> Option<IdentifierInfo>;
}

/// The interning table.
#[derive(Default)]
pub struct IdentifierTable {
    map: HashMap<Box<str>, IdentId>,
    infos: Vec<IdentifierInfo>,
    external: Option<Box<dyn IdentifierLookup>>,
}

impl std::fmt::Debug for IdentifierTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierTable")
            .field("len", &self.infos.len())
            .finish()
    }
}

enum KeywordGate {
    Always,
    C99,
    BoolKeyword,
}

/// The static keyword table walked by `add_keywords`.
const KEYWORDS: &[(&str, TokenKind, KeywordGate)] = &[
    ("auto", TokenKind::KwAuto, KeywordGate::Always),
    ("break", TokenKind::KwBreak, KeywordGate::Always),
    ("case", TokenKind::KwCase, KeywordGate::Always),
    ("char", TokenKind::KwChar, KeywordGate::Always),
    ("const", TokenKind::KwConst, KeywordGate::Always),
    ("continue", TokenKind::KwContinue, KeywordGate::Always),
    ("default", TokenKind::KwDefault, KeywordGate::Always),
    ("do", TokenKind::KwDo, KeywordGate::Always),
    ("double", TokenKind::KwDouble, KeywordGate::Always),
    ("else", TokenKind::KwElse, KeywordGate::Always),
    ("enum", TokenKind::KwEnum, KeywordGate::Always),
    ("extern", TokenKind::KwExtern, KeywordGate::Always),
    ("float", TokenKind::KwFloat, KeywordGate::Always),
    ("for", TokenKind::KwFor, KeywordGate::Always),
    ("goto", TokenKind::KwGoto, KeywordGate::Always),
    ("if", TokenKind::KwIf, KeywordGate::Always),
    ("inline", TokenKind::KwInline, KeywordGate::C99),
    ("int", TokenKind::KwInt, KeywordGate::Always),
    ("long", TokenKind::KwLong, KeywordGate::Always),
    ("register", TokenKind::KwRegister, KeywordGate::Always),
    ("restrict", TokenKind::KwRestrict, KeywordGate::C99),
    ("return", TokenKind::KwReturn, KeywordGate::Always),
    ("short", TokenKind::KwShort, KeywordGate::Always),
    ("signed", TokenKind::KwSigned, KeywordGate::Always),
    ("sizeof", TokenKind::KwSizeof, KeywordGate::Always),
    ("static", TokenKind::KwStatic, KeywordGate::Always),
    ("struct", TokenKind::KwStruct, KeywordGate::Always),
    ("switch", TokenKind::KwSwitch, KeywordGate::Always),
    ("typedef", TokenKind::KwTypedef, KeywordGate::Always),
    ("union", TokenKind::KwUnion, KeywordGate::Always),
    ("unsigned", TokenKind::KwUnsigned, KeywordGate::Always),
    ("void", TokenKind::KwVoid, KeywordGate::Always),
    ("volatile", TokenKind::KwVolatile, KeywordGate::Always),
    ("while", TokenKind::KwWhile, KeywordGate::Always),
    ("_Bool", TokenKind::KwBool, KeywordGate::BoolKeyword),
    ("_Complex", TokenKind::KwComplex, KeywordGate::C99),
    ("_Imaginary", TokenKind::KwImaginary, KeywordGate::C99),
];

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an external identifier source consulted on miss.
    pub fn set_external_lookup(&mut self, lookup: Box<dyn IdentifierLookup>) {
        self.external = Some(lookup);
    }

    /// Intern `name`, consulting the external source on miss. The
    /// returned handle is stable for the table's lifetime.
    pub fn get(&mut self, name: &str) -> IdentId {
        assert!(!name.is_empty(), "cannot intern a zero-length identifier");
        if let Some(&id) = self.map.get(name) {
            return id;
        }

        let info = match self.external.as_mut().and_then(|ext| ext.resolve(name)) {
            Some(info) => info,
            None => IdentifierInfo::new(name),
        };
        self.insert(name, info)
    }

    /// Unconditional insert, bypassing the external source. Used by
    /// external sources themselves to bootstrap entries without
    /// recursing. Panics if the spelling is already interned.
    pub fn create(&mut self, name: &str) -> IdentId {
        assert!(!name.is_empty(), "cannot intern a zero-length identifier");
        assert!(
            !self.map.contains_key(name),
            "identifier {name:?} already interned"
        );
        self.insert(name, IdentifierInfo::new(name))
    }

    fn insert(&mut self, name: &str, info: IdentifierInfo) -> IdentId {
        let id = IdentId(self.infos.len() as u32);
        self.infos.push(info);
        self.map.insert(name.into(), id);
        id
    }

    pub fn info(&self, id: IdentId) -> &IdentifierInfo {
        &self.infos[id.index()]
    }

    pub fn info_mut(&mut self, id: IdentId) -> &mut IdentifierInfo {
        &mut self.infos[id.index()]
    }

    /// Retag the identifiers of the static keyword table to their
    /// keyword kinds, gated by language options. An info fetched before
    /// this call is the same object afterwards and observes the retag.
    pub fn add_keywords(&mut self, opts: &LangOptions) {
        for (name, kind, gate) in KEYWORDS {
            let enabled = match gate {
                KeywordGate::Always => true,
                KeywordGate::C99 => opts.c99,
                KeywordGate::BoolKeyword => opts.bool_keyword,
            };
            if enabled {
                let id = self.get(name);
                self.infos[id.index()].set_token_kind(*kind);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdentId, &IdentifierInfo)> {
        self.infos
            .iter()
            .enumerate()
            .map(|(i, info)| (IdentId(i as u32), info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_byte_exact() {
        let mut table = IdentifierTable::new();
        let a = table.get("foo");
        let b = table.get("foo");
        let c = table.get("Foo");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.info(a).name(), "foo");
        assert_eq!(table.len(), 2);
    }

    #[test]
    #[should_panic(expected = "zero-length")]
    fn test_empty_name_rejected() {
        let mut table = IdentifierTable::new();
        table.get("");
    }

    #[test]
    #[should_panic(expected = "already interned")]
    fn test_create_requires_absent() {
        let mut table = IdentifierTable::new();
        table.get("foo");
        table.create("foo");
    }

    #[test]
    fn test_keyword_retag_applies_to_existing_info() {
        let mut table = IdentifierTable::new();
        // Fetch before keyword registration.
        let id = table.get("int");
        assert_eq!(table.info(id).token_kind(), TokenKind::Identifier);

        table.add_keywords(&LangOptions::c99_defaults());

        // Same handle, retagged in place.
        assert_eq!(table.get("int"), id);
        assert_eq!(table.info(id).token_kind(), TokenKind::KwInt);
    }

    #[test]
    fn test_keyword_gating() {
        let mut table = IdentifierTable::new();
        table.add_keywords(&LangOptions::default());
        let restrict = table.get("restrict");
        assert_eq!(table.info(restrict).token_kind(), TokenKind::Identifier);

        let mut c99 = IdentifierTable::new();
        c99.add_keywords(&LangOptions::c99_defaults());
        let restrict = c99.get("restrict");
        assert_eq!(c99.info(restrict).token_kind(), TokenKind::KwRestrict);
        let bool_kw = c99.get("_Bool");
        assert_eq!(c99.info(bool_kw).token_kind(), TokenKind::KwBool);
    }

    #[test]
    fn test_needs_handle_recompute() {
        let mut table = IdentifierTable::new();
        let id = table.get("X");
        assert!(!table.info(id).needs_handling());

        table.info_mut(id).set_has_macro_definition(true);
        assert!(table.info(id).needs_handling());

        table.info_mut(id).set_is_poisoned(true);
        table.info_mut(id).set_has_macro_definition(false);
        // Still poisoned, so still flagged.
        assert!(table.info(id).needs_handling());

        table.info_mut(id).set_is_poisoned(false);
        assert!(!table.info(id).needs_handling());
    }

    #[test]
    fn test_pp_keyword_kind() {
        let mut table = IdentifierTable::new();
        let id = table.get("define");
        assert_eq!(table.info(id).pp_keyword_kind(), PPKeywordKind::Define);
        let other = table.get("definitely");
        assert_eq!(table.info(other).pp_keyword_kind(), PPKeywordKind::NotKeyword);
    }

    struct Prepoisoned;

    impl IdentifierLookup for Prepoisoned {
        fn resolve(&mut self, name: &str) -> Option<IdentifierInfo> {
            if name == "gets" {
                let mut info = IdentifierInfo::new(name);
                info.set_is_poisoned(true);
                Some(info)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_external_lookup_consulted_on_miss() {
        let mut table = IdentifierTable::new();
        table.set_external_lookup(Box::new(Prepoisoned));

        let gets = table.get("gets");
        assert!(table.info(gets).is_poisoned());
        assert!(table.info(gets).needs_handling());

        let other = table.get("puts");
        assert!(!table.info(other).is_poisoned());

        // Cached thereafter; the external source is not re-consulted.
        assert_eq!(table.get("gets"), gets);
    }
}
