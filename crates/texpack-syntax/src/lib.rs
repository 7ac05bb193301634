//! # texpack syntax
//!
//! Fault-tolerant LaTeX lexer and lossless syntax tree, tuned for finding the
//! commands that pull other files into a build.
//!
//! The tree is a [`rowan`] green tree: every byte of the input is preserved, so
//! offsets taken from nodes point straight back into the source file. Besides
//! generic structure (groups, environments) the parser marks three things the
//! dependency scanner cares about:
//!
//! - [`SyntaxKind::Directive`] nodes for the commands listed in
//!   [`parser::DIRECTIVE_COMMANDS`], together with their optional and
//!   mandatory arguments
//! - [`SyntaxKind::VerbatimEnvironment`] nodes whose content must never be
//!   interpreted
//! - [`SyntaxKind::Comment`] and [`SyntaxKind::Verbatim`] tokens
//!
//! ```
//! use texpack_syntax::{parse, SyntaxKind};
//!
//! let tree = parse(r"\usepackage[utf8]{inputenc} % \input{ignored}").syntax();
//! let directives: Vec<_> = tree
//!     .descendants()
//!     .filter(|n| n.kind() == SyntaxKind::Directive)
//!     .collect();
//! assert_eq!(directives.len(), 1);
//! ```

pub mod lexer;
pub mod parser;


pub use parser::{parse, ParseResult, SyntaxError};
use rowan::Language;
pub use rowan::{TextRange, TextSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    // Tokens
    LBrace = 0,
    RBrace,
    LBracket,
    RBracket,
    Command, // \input, \@input, \%
    Whitespace,
    Comment, // % ...
    Text,    // Regular text
    Dollar,
    Verbatim, // \verb|...|
    Error,    // Lexer error

    // Composite Nodes
    Root,
    Group,               // { ... }
    OptionalGroup,       // [ ... ] after a directive
    Environment,         // \begin{...} ... \end{...}
    VerbatimEnvironment, // \begin{verbatim} ... \end{verbatim}
    Directive,           // \input{...}, \usepackage[...]{...}
    BareArgument,        // \input intro

    // Technical
    Eof,
}

impl SyntaxKind {
    /// Whitespace and comments, which may sit between a command and its arguments.
    pub fn is_trivia(self) -> bool {
        matches!(self, SyntaxKind::Whitespace | SyntaxKind::Comment)
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TexLanguage {}

impl Language for TexLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 <= SyntaxKind::Eof as u16);
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<TexLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<TexLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<TexLanguage>;
