//! Token kind registry
//!
//! The closed enumeration of token kinds produced by the lexer, the
//! parallel enumeration of preprocessor directive keywords, and the
//! name/spelling lookups used by dumps and tests.

/// Every kind of token the lexer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Special
    Unknown,
    Eof,
    /// End of a preprocessor-directive line.
    Eom,
    Comment,
    Identifier,

    // Numeric constants, split by C type per the suffix rules
    IntConst,
    UIntConst,
    LongConst,
    ULongConst,
    LongLongConst,
    ULongLongConst,
    FloatConst,
    DoubleConst,
    LongDoubleConst,

    // Other literals
    CharConst,
    StringLiteral,
    WideStringLiteral,
    /// `<path>` after `#include`.
    AngleStringLiteral,

    // Keywords
    KwAuto,
    KwBreak,
    KwCase,
    KwChar,
    KwConst,
    KwContinue,
    KwDefault,
    KwDo,
    KwDouble,
    KwElse,
    KwEnum,
    KwExtern,
    KwFloat,
    KwFor,
    KwGoto,
    KwIf,
    KwInline,
    KwInt,
    KwLong,
    KwRegister,
    KwRestrict,
    KwReturn,
    KwShort,
    KwSigned,
    KwSizeof,
    KwStatic,
    KwStruct,
    KwSwitch,
    KwTypedef,
    KwUnion,
    KwUnsigned,
    KwVoid,
    KwVolatile,
    KwWhile,
    KwBool,
    KwComplex,
    KwImaginary,

    // Punctuators
    LSquare,
    RSquare,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Period,
    Ellipsis,
    Amp,
    AmpAmp,
    AmpEqual,
    Star,
    StarEqual,
    Plus,
    PlusPlus,
    PlusEqual,
    Minus,
    Arrow,
    MinusMinus,
    MinusEqual,
    Tilde,
    Exclaim,
    ExclaimEqual,
    Slash,
    SlashEqual,
    Percent,
    PercentEqual,
    Less,
    LessLess,
    LessEqual,
    LessLessEqual,
    Greater,
    GreaterGreater,
    GreaterEqual,
    GreaterGreaterEqual,
    Caret,
    CaretEqual,
    Pipe,
    PipePipe,
    PipeEqual,
    Question,
    Colon,
    Semi,
    Equal,
    EqualEqual,
    Comma,
    Hash,
    HashHash,

    // Annotations minted by the parser
    AnnotTypename,
}

impl TokenKind {
    /// The internal name (e.g. `l_square`), used in dumps and tests,
    /// not in user-facing diagnostics.
    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Unknown => "unknown",
            Eof => "eof",
            Eom => "eom",
            Comment => "comment",
            Identifier => "identifier",
            IntConst => "int_const",
            UIntConst => "uint_const",
            LongConst => "long_const",
            ULongConst => "ulong_const",
            LongLongConst => "longlong_const",
            ULongLongConst => "ulonglong_const",
            FloatConst => "float_const",
            DoubleConst => "double_const",
            LongDoubleConst => "longdouble_const",
            CharConst => "char_constant",
            StringLiteral => "string_literal",
            WideStringLiteral => "wide_string_literal",
            AngleStringLiteral => "angle_string_literal",
            KwAuto => "auto",
            KwBreak => "break",
            KwCase => "case",
            KwChar => "char",
            KwConst => "const",
            KwContinue => "continue",
            KwDefault => "default",
            KwDo => "do",
            KwDouble => "double",
            KwElse => "else",
            KwEnum => "enum",
            KwExtern => "extern",
            KwFloat => "float",
            KwFor => "for",
            KwGoto => "goto",
            KwIf => "if",
            KwInline => "inline",
            KwInt => "int",
            KwLong => "long",
            KwRegister => "register",
            KwRestrict => "restrict",
            KwReturn => "return",
            KwShort => "short",
            KwSigned => "signed",
            KwSizeof => "sizeof",
            KwStatic => "static",
            KwStruct => "struct",
            KwSwitch => "switch",
            KwTypedef => "typedef",
            KwUnion => "union",
            KwUnsigned => "unsigned",
            KwVoid => "void",
            KwVolatile => "volatile",
            KwWhile => "while",
            KwBool => "_Bool",
            KwComplex => "_Complex",
            KwImaginary => "_Imaginary",
            LSquare => "l_square",
            RSquare => "r_square",
            LParen => "l_paren",
            RParen => "r_paren",
            LBrace => "l_brace",
            RBrace => "r_brace",
            Period => "period",
            Ellipsis => "ellipsis",
            Amp => "amp",
            AmpAmp => "ampamp",
            AmpEqual => "ampequal",
            Star => "star",
            StarEqual => "starequal",
            Plus => "plus",
            PlusPlus => "plusplus",
            PlusEqual => "plusequal",
            Minus => "minus",
            Arrow => "arrow",
            MinusMinus => "minusminus",
            MinusEqual => "minusequal",
            Tilde => "tilde",
            Exclaim => "exclaim",
            ExclaimEqual => "exclaimequal",
            Slash => "slash",
            SlashEqual => "slashequal",
            Percent => "percent",
            PercentEqual => "percentequal",
            Less => "less",
            LessLess => "lessless",
            LessEqual => "lessequal",
            LessLessEqual => "lesslessequal",
            Greater => "greater",
            GreaterGreater => "greatergreater",
            GreaterEqual => "greaterequal",
            GreaterGreaterEqual => "greatergreaterequal",
            Caret => "caret",
            CaretEqual => "caretequal",
            Pipe => "pipe",
            PipePipe => "pipepipe",
            PipeEqual => "pipeequal",
            Question => "question",
            Colon => "colon",
            Semi => "semi",
            Equal => "equal",
            EqualEqual => "equalequal",
            Comma => "comma",
            Hash => "hash",
            HashHash => "hashhash",
            AnnotTypename => "annot_typename",
        }
    }

    /// The literal spelling of punctuators and keywords; `None` for
    /// identifier, literal, and annotation kinds whose spelling lives in
    /// a source buffer.
    pub fn simple_spelling(self) -> Option<&'static str> {
        use TokenKind::*;
        Some(match self {
            LSquare => "[",
            RSquare => "]",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            Period => ".",
            Ellipsis => "...",
            Amp => "&",
            AmpAmp => "&&",
            AmpEqual => "&=",
            Star => "*",
            StarEqual => "*=",
            Plus => "+",
            PlusPlus => "++",
            PlusEqual => "+=",
            Minus => "-",
            Arrow => "->",
            MinusMinus => "--",
            MinusEqual => "-=",
            Tilde => "~",
            Exclaim => "!",
            ExclaimEqual => "!=",
            Slash => "/",
            SlashEqual => "/=",
            Percent => "%",
            PercentEqual => "%=",
            Less => "<",
            LessLess => "<<",
            LessEqual => "<=",
            LessLessEqual => "<<=",
            Greater => ">",
            GreaterGreater => ">>",
            GreaterEqual => ">=",
            GreaterGreaterEqual => ">>=",
            Caret => "^",
            CaretEqual => "^=",
            Pipe => "|",
            PipePipe => "||",
            PipeEqual => "|=",
            Question => "?",
            Colon => ":",
            Semi => ";",
            Equal => "=",
            EqualEqual => "==",
            Comma => ",",
            Hash => "#",
            HashHash => "##",
            KwAuto | KwBreak | KwCase | KwChar | KwConst | KwContinue | KwDefault | KwDo
            | KwDouble | KwElse | KwEnum | KwExtern | KwFloat | KwFor | KwGoto | KwIf
            | KwInline | KwInt | KwLong | KwRegister | KwRestrict | KwReturn | KwShort
            | KwSigned | KwSizeof | KwStatic | KwStruct | KwSwitch | KwTypedef | KwUnion
            | KwUnsigned | KwVoid | KwVolatile | KwWhile | KwBool | KwComplex | KwImaginary => {
                self.name()
            }
            _ => return None,
        })
    }

    /// True for the numeric constant kinds (`int_const` … `longdouble_const`).
    pub fn is_numeric_constant(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            IntConst
                | UIntConst
                | LongConst
                | ULongConst
                | LongLongConst
                | ULongLongConst
                | FloatConst
                | DoubleConst
                | LongDoubleConst
        )
    }

    /// True for literal kinds whose token data may point into a buffer.
    pub fn is_literal(self) -> bool {
        use TokenKind::*;
        self.is_numeric_constant()
            || matches!(
                self,
                CharConst | StringLiteral | WideStringLiteral | AngleStringLiteral
            )
    }

    pub fn is_annotation(self) -> bool {
        matches!(self, TokenKind::AnnotTypename)
    }
}

/// Directive keywords recognized after a `#` at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PPKeywordKind {
    NotKeyword,
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
    Defined,
    Include,
    IncludeNext,
    Import,
    Define,
    Undef,
    Line,
    Error,
    Pragma,
    Warning,
}

impl PPKeywordKind {
    /// Classify a directive name, e.g. `define` → `PPKeywordKind::Define`.
    pub fn from_spelling(name: &str) -> Self {
        use PPKeywordKind::*;
        match name {
            "if" => If,
            "ifdef" => Ifdef,
            "ifndef" => Ifndef,
            "elif" => Elif,
            "else" => Else,
            "endif" => Endif,
            "defined" => Defined,
            "include" => Include,
            "include_next" => IncludeNext,
            "import" => Import,
            "define" => Define,
            "undef" => Undef,
            "line" => Line,
            "error" => Error,
            "pragma" => Pragma,
            "warning" => Warning,
            _ => NotKeyword,
        }
    }
}
