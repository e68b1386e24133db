//! Token definitions produced by the lexer.

/// The kind of a lexical token.
///
/// `Indent`, `Dedent`, and `Newline` are synthetic tokens derived from the
/// layout of the source text; `NotIn` and `IsNot` are word-pair operators
/// merged by one-token lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TokenKind {
    // Literals and names.
    Ident,
    IntLit,
    FloatLit,
    StrLit,
    /// An f-string; the literal holds the raw content for later parsing.
    FStrLit,

    // Layout.
    Newline,
    Indent,
    Dedent,
    Eof,
    /// An unrecognised byte; the parser reports it.
    Illegal,

    // Punctuation.
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    At,

    // Operators.
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    DoubleStarAssign,
    ShlAssign,
    ShrAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,

    // Keywords.
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Def,
    Class,
    Return,
    Break,
    Continue,
    Pass,
    And,
    Or,
    Not,
    Try,
    Except,
    Finally,
    Raise,
    Global,
    Nonlocal,
    True,
    False,
    None,
    Import,
    From,
    As,
    Lambda,
    Is,
    Yield,
    With,

    // Word-pair operators.
    NotIn,
    IsNot,
}

impl TokenKind {
    /// Maps an identifier to its keyword kind, if it is one.
    pub(crate) fn keyword(ident: &str) -> Option<Self> {
        Some(match ident {
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "in" => Self::In,
            "def" => Self::Def,
            "class" => Self::Class,
            "return" => Self::Return,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "pass" => Self::Pass,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "try" => Self::Try,
            "except" => Self::Except,
            "finally" => Self::Finally,
            "raise" => Self::Raise,
            "global" => Self::Global,
            "nonlocal" => Self::Nonlocal,
            "True" => Self::True,
            "False" => Self::False,
            "None" => Self::None,
            "import" => Self::Import,
            "from" => Self::From,
            "as" => Self::As,
            "lambda" => Self::Lambda,
            "is" => Self::Is,
            "yield" => Self::Yield,
            "with" => Self::With,
            _ => return Option::None,
        })
    }

    /// True for augmented-assignment operators (`+=`, `//=`, ...).
    pub(crate) fn is_aug_assign(self) -> bool {
        matches!(
            self,
            Self::PlusAssign
                | Self::MinusAssign
                | Self::StarAssign
                | Self::SlashAssign
                | Self::DoubleSlashAssign
                | Self::PercentAssign
                | Self::DoubleStarAssign
                | Self::ShlAssign
                | Self::ShrAssign
                | Self::AmpAssign
                | Self::PipeAssign
                | Self::CaretAssign
        )
    }
}

/// One lexical token with its literal text and source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The literal text: decoded content for strings, raw digits for
    /// numbers, the identifier text for names and keywords.
    pub literal: String,
    /// 1-indexed source line of the token's first byte.
    pub line: u32,
    /// 1-indexed source column of the token's first byte.
    pub column: u32,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, literal: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }
}
