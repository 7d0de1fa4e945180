//! End-to-end lexing tests: whole-pipeline scenarios driven through
//! the preprocessor shell, plus round-trip properties over raw-mode
//! whitespace-keeping lexing.

use cptoyc_basic::{
    DiagnosticsEngine, FileManager, LangOptions, SourceBuffer, SourceManager, TokenKind,
};
use cptoyc_lex::{float_value, int_value, string_value, Lexer, Preprocessor, Token};
use proptest::prelude::*;

fn preprocessor_over(src: &[u8]) -> Preprocessor {
    let mut sm = SourceManager::new();
    sm.create_main_file_id_for_buffer(SourceBuffer::from_bytes(src, "main.c"));
    let mut pp = Preprocessor::new(
        LangOptions::c99_defaults(),
        FileManager::new(),
        sm,
        DiagnosticsEngine::new(),
    );
    pp.enter_main_source_file();
    pp
}

fn drain(pp: &mut Preprocessor) -> Vec<Token> {
    let mut toks = Vec::new();
    let mut tok = Token::new();
    loop {
        pp.lex(&mut tok);
        toks.push(tok);
        if tok.is(TokenKind::Eof) {
            break;
        }
    }
    toks
}

/// Raw-lex `src` in whitespace-keeping mode and concatenate every
/// spelling.
fn rebuild_bytes(src: &[u8]) -> Vec<u8> {
    let mut sm = SourceManager::new();
    let fid = sm.create_file_id_for_buffer(SourceBuffer::from_bytes(src, "t.c"));
    let opts = LangOptions::c99_defaults();
    let mut lexer = Lexer::new_raw(fid, &sm, &opts);
    lexer.set_keep_whitespace_mode(true);

    let mut out = Vec::new();
    let mut tok = Token::new();
    loop {
        tok.start_token();
        lexer.lex_from_raw_lexer(&sm, &mut tok);
        if tok.is(TokenKind::Eof) {
            break;
        }
        let (_, off) = sm.decomposed_loc(tok.location());
        out.extend_from_slice(&sm.buffer_data(fid)[off as usize..(off + tok.length()) as usize]);
    }
    out
}

#[test]
fn test_integer_base_and_suffix_scenario() {
    let mut pp = preprocessor_over(b"0x1Full\n0755LL\n42u\n");
    let toks = drain(&mut pp);
    let kinds: Vec<_> = toks.iter().map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::ULongLongConst,
            TokenKind::LongLongConst,
            TokenKind::UIntConst,
            TokenKind::Eof,
        ]
    );
    let values: Vec<_> = toks[..3]
        .iter()
        .map(|t| int_value(&pp.get_spelling(t)).expect("valid integer"))
        .collect();
    assert_eq!(values, vec![31, 493, 42]);
}

#[test]
fn test_hex_float_scenario() {
    let mut pp = preprocessor_over(b"0x1.8p+1f\n");
    let toks = drain(&mut pp);
    assert_eq!(toks[0].kind(), TokenKind::FloatConst);
    assert_eq!(float_value(&pp.get_spelling(&toks[0])), Some(3.0));
    assert!(!pp.diagnostics().has_error_occurred());
}

#[test]
fn test_string_escape_scenario() {
    let mut pp = preprocessor_over(b"\"a\\tb\\n\"");
    let toks = drain(&mut pp);
    assert_eq!(toks[0].kind(), TokenKind::StringLiteral);
    let decoded = string_value(&pp.get_spelling(&toks[0])).expect("valid string");
    assert_eq!(decoded, b"a\tb\n");
}

#[test]
fn test_unclosed_comment_scenario() {
    let mut pp = preprocessor_over(b"/* oops\n");
    let toks = drain(&mut pp);
    assert_eq!(toks.last().map(|t| t.kind()), Some(TokenKind::Eof));
    assert!(pp
        .diagnostics()
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("unclosed multicomment")));
}

#[test]
fn test_keyword_scenario() {
    let mut pp = preprocessor_over(b"int x;");
    let toks = drain(&mut pp);
    let kinds: Vec<_> = toks.iter().map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::KwInt,
            TokenKind::Identifier,
            TokenKind::Semi,
            TokenKind::Eof,
        ]
    );
    let id = toks[0].ident().expect("keyword carries identifier info");
    assert_eq!(
        pp.identifier_table().info(id).token_kind(),
        TokenKind::KwInt
    );
}

#[test]
fn test_round_trip_realistic_program() {
    let src: &[u8] = b"/* n-queens kernel */\n\
static int count = 0;\n\
\n\
int place(int row, int col, int *pos) {\n\
    for (int i = 0; i < row; i++) {\n\
        if (pos[i] == col || i - pos[i] == row - col) {\n\
            return 0;\n\
        }\n\
    }\n\
    return 1;   // safe\n\
}\n";
    assert_eq!(rebuild_bytes(src), src);
}

#[test]
fn test_round_trip_with_directives_and_strings() {
    let src: &[u8] = b"#ifndef T_H\n#define T_H\nconst char *s = \"a\\tb\";\n#endif\n";
    assert_eq!(rebuild_bytes(src), src);
}

fn token_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_][a-zA-Z0-9_]{0,8}",
        "(0|[1-9][0-9]{0,6})",
        "0x[0-9a-fA-F]{1,6}",
        Just("<<=".to_string()),
        Just("->".to_string()),
        Just("...".to_string()),
        Just("==".to_string()),
        Just("{".to_string()),
        Just(";".to_string()),
        "\"[ -!#-\\[\\]-~]{0,10}\"",
    ]
}

fn whitespace() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(" ".to_string()),
        Just("  ".to_string()),
        Just("\t".to_string()),
        Just("\n".to_string()),
        Just(" \n ".to_string()),
    ]
}

proptest! {
    /// Concatenating keep-whitespace spellings reproduces the source.
    #[test]
    fn prop_round_trip(parts in prop::collection::vec((token_fragment(), whitespace()), 0..40)) {
        let mut src = String::new();
        for (tok, ws) in &parts {
            src.push_str(tok);
            src.push_str(ws);
        }
        prop_assert_eq!(rebuild_bytes(src.as_bytes()), src.as_bytes());
    }

    /// Two independent lexes of the same source agree token for token.
    #[test]
    fn prop_lex_is_deterministic(parts in prop::collection::vec((token_fragment(), whitespace()), 0..30)) {
        let mut src = String::new();
        for (tok, ws) in &parts {
            src.push_str(tok);
            src.push_str(ws);
        }
        let run = || {
            let mut pp = preprocessor_over(src.as_bytes());
            drain(&mut pp)
                .iter()
                .map(|t| (t.kind(), t.length(), t.flags()))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }
}
