//! CPTOYC Driver
//!
//! `cptoyc <file>` lexes one translation unit and dumps its token
//! stream, one token per line. `-` reads standard input. Diagnostics
//! are rendered to stderr at the end; the exit code reflects whether
//! any error-level diagnostic fired.

use std::process::ExitCode;

use cptoyc_basic::{
    DiagnosticsEngine, FileManager, LangOptions, SourceBuffer, SourceManager, TokenKind,
};
use cptoyc_lex::{Preprocessor, Token};

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (json, input) = match parse_args(&args) {
        Some(parsed) => parsed,
        None => {
            eprintln!("usage: cptoyc [--json] <file>");
            return ExitCode::from(2);
        }
    };

    let lang = LangOptions::c99_defaults();
    let mut file_mgr = FileManager::new();
    let mut source_mgr = SourceManager::new();

    if input == "-" {
        let buffer = match SourceBuffer::from_stdin() {
            Ok(buffer) => buffer,
            Err(e) => {
                eprintln!("cptoyc: {e}");
                return ExitCode::FAILURE;
            }
        };
        source_mgr.create_main_file_id_for_buffer(buffer);
    } else {
        let entry = match file_mgr.get_file(&input) {
            Some(entry) => entry.clone(),
            None => {
                eprintln!("cptoyc: error reading '{input}': no such file");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = source_mgr.create_main_file_id(&entry) {
            eprintln!("cptoyc: {e}");
            return ExitCode::FAILURE;
        }
    }

    let mut pp = Preprocessor::new(lang, file_mgr, source_mgr, DiagnosticsEngine::new());
    pp.enter_main_source_file();
    tracing::info!(input = %input, "lexing translation unit");

    let mut tok = Token::new();
    loop {
        pp.lex(&mut tok);
        if json {
            println!("{}", token_json(&pp, &tok));
        } else {
            println!("{}", pp.dump_token(&tok, true));
        }
        if tok.is(TokenKind::Eof) {
            break;
        }
    }

    for diag in pp.diagnostics().diagnostics() {
        eprintln!(
            "{}: {}: {}",
            pp.format_location(diag.location),
            diag.level.name(),
            diag.message
        );
    }

    let stats = pp.stats();
    tracing::debug!(?stats, "preprocessor statistics");
    let fm_stats = pp.file_manager().stats();
    tracing::debug!(?fm_stats, "file manager statistics");

    if pp.diagnostics().has_error_occurred() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn parse_args(args: &[String]) -> Option<(bool, String)> {
    match args {
        [_, input] if input.as_str() != "--json" => Some((false, input.clone())),
        [_, flag, input] if flag.as_str() == "--json" => Some((true, input.clone())),
        _ => None,
    }
}

fn token_json(pp: &Preprocessor, tok: &Token) -> String {
    serde_json::json!({
        "kind": tok.name(),
        "spelling": pp.get_spelling(tok),
        "loc": pp.format_location(tok.location()),
        "start_of_line": tok.is_at_start_of_line(),
        "leading_space": tok.has_leading_space(),
        "needs_cleaning": tok.needs_cleaning(),
    })
    .to_string()
}
