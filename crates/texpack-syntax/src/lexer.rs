use crate::SyntaxKind;

/// A lexer for LaTeX source code.
///
/// ## Overview
///
/// The lexer performs **character-level scanning** of LaTeX source, producing
/// a stream of ([`SyntaxKind`], `&str`) tuples. It handles:
///
/// - **Commands**: `\input`, `\@input` (`@` counts as a letter, as it does in
///   class and package files), `\%` (escape sequences)
/// - **Delimiters**: `{`, `}`, `[`, `]`
/// - **Comments**: `%` through end of line; an escaped `\%` is a command, not
///   a comment
/// - **Inline verbatim**: `\verb|...|` and `\verb*|...|` become a single
///   [`SyntaxKind::Verbatim`] token so nothing inside is mistaken for markup
/// - **Whitespace**: Consecutive whitespace collapsed into single tokens
/// - **Text**: Everything else, consumed greedily until a special character
///
/// Tokens are `&str` slices into the original input; concatenating them
/// reproduces the source exactly.
///
/// ## Examples
///
/// ```
/// use texpack_syntax::lexer::Lexer;
/// use texpack_syntax::SyntaxKind;
///
/// let tokens: Vec<_> = Lexer::new(r"\input{intro} % draft").collect();
///
/// assert_eq!(tokens[0], (SyntaxKind::Command, r"\input"));
/// assert_eq!(tokens[1].0, SyntaxKind::LBrace);
/// assert_eq!(tokens[2], (SyntaxKind::Text, "intro"));
/// assert_eq!(tokens[5], (SyntaxKind::Comment, "% draft"));
/// ```
pub struct Lexer<'a> {
    /// The input source text being lexed.
    input: &'a str,
    /// Current byte position in the input.
    position: usize,
}

fn is_command_letter(c: char) -> bool {
    c.is_alphabetic() || c == '@'
}

impl<'a> Lexer<'a> {
    /// Creates a new `Lexer` for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(n) = self.peek_char() {
            if pred(n) {
                self.position += n.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Consumes the body of `\verb<d>...<d>` after the command name.
    ///
    /// An unterminated body stops at the end of the line, like TeX's own error
    /// recovery.
    fn eat_verb_body(&mut self) {
        if self.peek_char() == Some('*') {
            self.position += 1;
        }
        let Some(delim) = self.peek_char() else {
            return;
        };
        if delim.is_whitespace() || is_command_letter(delim) {
            return;
        }
        self.position += delim.len_utf8();
        while let Some(n) = self.peek_char() {
            if n == '\n' || n == '\r' {
                break;
            }
            self.position += n.len_utf8();
            if n == delim {
                break;
            }
        }
    }

    /// Returns the next token (kind, text).
    /// If EOF, returns (SyntaxKind::Eof, "").
    pub fn next_token(&mut self) -> (SyntaxKind, &'a str) {
        let start = self.position;
        let Some(c) = self.peek_char() else {
            return (SyntaxKind::Eof, "");
        };
        self.position += c.len_utf8();

        let kind = match c {
            '\\' => match self.peek_char() {
                Some(next) if is_command_letter(next) => {
                    self.eat_while(is_command_letter);
                    if &self.input[start..self.position] == "\\verb" {
                        self.eat_verb_body();
                        SyntaxKind::Verbatim
                    } else {
                        SyntaxKind::Command
                    }
                }
                Some(next) => {
                    // Single-symbol command: \% or \{
                    self.position += next.len_utf8();
                    SyntaxKind::Command
                }
                None => SyntaxKind::Command,
            },
            '{' => SyntaxKind::LBrace,
            '}' => SyntaxKind::RBrace,
            '[' => SyntaxKind::LBracket,
            ']' => SyntaxKind::RBracket,
            '$' => SyntaxKind::Dollar,
            '%' => {
                self.eat_while(|n| n != '\n' && n != '\r');
                SyntaxKind::Comment
            }
            c if c.is_whitespace() => {
                self.eat_while(char::is_whitespace);
                SyntaxKind::Whitespace
            }
            _ => {
                self.eat_while(|n| {
                    !matches!(n, '\\' | '{' | '}' | '[' | ']' | '%' | '$') && !n.is_whitespace()
                });
                SyntaxKind::Text
            }
        };

        (kind, &self.input[start..self.position])
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = (SyntaxKind, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let (kind, text) = self.next_token();
        if kind == SyntaxKind::Eof {
            None
        } else {
            Some((kind, text))
        }
    }
}
