//! CPTOYC Lex - Tokens, Lexer, and Preprocessor Shell
//!
//! Turns the buffers managed by `cptoyc-basic` into a stream of
//! classified C tokens.
//!
//! Architecture:
//! ```text
//! SourceBuffer bytes
//!     ↓
//! Lexer (state machine, one token per call)
//!     ↓
//! Preprocessor shell (include stack, identifier lookup, scratch tokens)
//!     ↓
//! Token stream consumer (parser, dumper)
//! ```

pub mod lexer;
pub mod literal_support;
pub mod multiple_include_opt;
pub mod preprocessor;
pub mod scratch_buffer;
pub mod token;

// Re-export key types for convenience
pub use lexer::*;
pub use literal_support::*;
pub use multiple_include_opt::*;
pub use preprocessor::*;
pub use scratch_buffer::*;
pub use token::*;
