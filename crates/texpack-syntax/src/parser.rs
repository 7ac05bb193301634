use crate::{lexer::Lexer, SyntaxKind, SyntaxNode};
use rowan::{GreenNode, GreenNodeBuilder, TextRange, TextSize};
use std::iter::Peekable;

/// Commands parsed into [`SyntaxKind::Directive`] nodes.
pub const DIRECTIVE_COMMANDS: &[&str] = &[
    "input",
    "@input",
    "include",
    "InputIfFileExists",
    "subfile",
    "documentclass",
    "LoadClass",
    "LoadClassWithOptions",
    "usepackage",
    "RequirePackage",
    "RequirePackageWithOptions",
    "templatetype",
    "bibliographystyle",
    "bibliography",
    "addbibresource",
    "addglobalbib",
    "includegraphics",
    "includepdf",
    "graphicspath",
];

/// Directives that also accept the primitive `\input file` form.
const BARE_ARGUMENT_COMMANDS: &[&str] = &["input", "@input"];

/// Environments whose body is never interpreted.
pub const VERBATIM_ENVIRONMENTS: &[&str] = &[
    "verbatim",
    "verbatim*",
    "Verbatim",
    "Verbatim*",
    "lstlisting",
    "minted",
    "comment",
];

pub fn is_directive_command(name: &str) -> bool {
    DIRECTIVE_COMMANDS.contains(&name)
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub range: TextRange,
}

pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<SyntaxError>,
    current_offset: TextSize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input).peekable(),
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
            current_offset: TextSize::from(0),
        }
    }

    pub fn parse(mut self) -> ParseResult {
        self.builder.start_node(SyntaxKind::Root.into());
        while self.peek() != SyntaxKind::Eof {
            self.parse_element();
        }
        self.builder.finish_node();
        ParseResult {
            green_node: self.builder.finish(),
            errors: self.errors,
        }
    }

    fn peek(&mut self) -> SyntaxKind {
        self.lexer
            .peek()
            .map(|(k, _)| *k)
            .unwrap_or(SyntaxKind::Eof)
    }

    fn peek_text(&mut self) -> &'a str {
        self.lexer.peek().map(|(_, t)| *t).unwrap_or("")
    }

    /// Adds the next token to the tree and returns its text.
    fn bump(&mut self) -> &'a str {
        if let Some((kind, text)) = self.lexer.next() {
            self.builder.token(kind.into(), text);
            self.current_offset += TextSize::of(text);
            text
        } else {
            ""
        }
    }

    fn bump_trivia(&mut self) {
        while self.peek().is_trivia() {
            self.bump();
        }
    }

    fn error(&mut self, message: String) {
        let start = self.current_offset;
        let len = TextSize::of(self.peek_text());
        let range = TextRange::at(start, len);
        self.errors.push(SyntaxError { message, range });
    }

    fn parse_element(&mut self) {
        match self.peek() {
            SyntaxKind::Command => self.parse_command_or_environment(),
            SyntaxKind::LBrace => {
                self.parse_group();
            }
            SyntaxKind::RBrace => {
                self.error("Unmatched '}'".into());
                self.builder.start_node(SyntaxKind::Error.into());
                self.bump();
                self.builder.finish_node();
            }
            SyntaxKind::Eof => {}
            _ => {
                self.bump();
            }
        }
    }

    /// Parses `{ ... }` and returns the text of its direct (non-nested) tokens.
    fn parse_group(&mut self) -> String {
        let mut direct = String::new();
        self.builder.start_node(SyntaxKind::Group.into());
        self.bump(); // Consume '{'

        loop {
            match self.peek() {
                SyntaxKind::Eof => {
                    self.error("Expected '}'".into());
                    break;
                }
                SyntaxKind::RBrace => {
                    self.bump();
                    break;
                }
                SyntaxKind::Text | SyntaxKind::Whitespace | SyntaxKind::LBracket
                | SyntaxKind::RBracket => direct.push_str(self.bump()),
                _ => self.parse_element(),
            }
        }

        self.builder.finish_node();
        direct
    }

    fn parse_optional_group(&mut self) {
        self.builder.start_node(SyntaxKind::OptionalGroup.into());
        self.bump(); // Consume '['

        loop {
            match self.peek() {
                SyntaxKind::RBracket => {
                    self.bump();
                    break;
                }
                SyntaxKind::Eof | SyntaxKind::RBrace => {
                    self.error("Expected ']'".into());
                    break;
                }
                _ => self.parse_element(),
            }
        }

        self.builder.finish_node();
    }

    fn parse_command_or_environment(&mut self) {
        let text = self.peek_text();
        let name = text.strip_prefix('\\').unwrap_or(text);
        if name == "begin" {
            self.parse_environment();
        } else if is_directive_command(name) {
            let bare = BARE_ARGUMENT_COMMANDS.contains(&name);
            self.parse_directive(bare);
        } else {
            self.bump();
        }
    }

    /// `\cmd [opt]... {arg}`, or `\input file` when `bare` is set.
    fn parse_directive(&mut self, bare: bool) {
        self.builder.start_node(SyntaxKind::Directive.into());
        self.bump(); // Consume command

        loop {
            self.bump_trivia();
            match self.peek() {
                SyntaxKind::LBracket => self.parse_optional_group(),
                SyntaxKind::LBrace => {
                    self.parse_group();
                    break;
                }
                SyntaxKind::Text | SyntaxKind::Command if bare => {
                    self.parse_bare_argument();
                    break;
                }
                _ => {
                    self.error("Expected '{' after directive".into());
                    break;
                }
            }
        }

        self.builder.finish_node();
    }

    /// A run of text and command tokens up to the next whitespace or delimiter.
    /// Once a file name has started, a control sequence ends it
    /// (`\input intro.tex\relax`); leading macros are kept (`\input\jobname-x`).
    fn parse_bare_argument(&mut self) {
        self.builder.start_node(SyntaxKind::BareArgument.into());
        let mut seen_text = false;
        loop {
            match self.peek() {
                SyntaxKind::Text => seen_text = true,
                SyntaxKind::Command if !seen_text => {}
                _ => break,
            }
            self.bump();
        }
        self.builder.finish_node();
    }

    fn parse_environment(&mut self) {
        let checkpoint = self.builder.checkpoint();
        self.bump(); // Consume \begin
        self.bump_trivia();

        let name = if self.peek() == SyntaxKind::LBrace {
            self.parse_group().trim().to_string()
        } else {
            self.error("Expected '{' after \\begin".into());
            String::new()
        };

        if VERBATIM_ENVIRONMENTS.contains(&name.as_str()) {
            self.builder
                .start_node_at(checkpoint, SyntaxKind::VerbatimEnvironment.into());
            self.parse_verbatim_body(&name);
        } else {
            self.builder
                .start_node_at(checkpoint, SyntaxKind::Environment.into());
            self.parse_environment_body();
        }

        self.builder.finish_node();
    }

    fn parse_environment_body(&mut self) {
        loop {
            match self.peek() {
                SyntaxKind::Eof => {
                    self.error("Unclosed environment, expected \\end".into());
                    break;
                }
                SyntaxKind::RBrace => {
                    // The environment cannot outlive the group it was opened in.
                    self.error("Unclosed environment before '}'".into());
                    break;
                }
                SyntaxKind::Command if self.peek_text() == "\\end" => {
                    self.bump(); // Consume \end
                    self.bump_trivia();
                    if self.peek() == SyntaxKind::LBrace {
                        self.parse_group();
                    } else {
                        self.error("Expected '{' after \\end".into());
                    }
                    break;
                }
                _ => self.parse_element(),
            }
        }
    }

    /// Consumes raw tokens until `\end{name}`.
    fn parse_verbatim_body(&mut self, name: &str) {
        loop {
            match self.peek() {
                SyntaxKind::Eof => {
                    self.error(format!("Unclosed verbatim environment '{}'", name));
                    break;
                }
                SyntaxKind::Command if self.peek_text() == "\\end" => {
                    self.bump();
                    if self.peek() == SyntaxKind::LBrace && self.parse_raw_group().trim() == name {
                        break;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// `{...}` without interpreting its content; nesting is not tracked.
    fn parse_raw_group(&mut self) -> String {
        let mut text = String::new();
        self.builder.start_node(SyntaxKind::Group.into());
        self.bump();
        while !matches!(self.peek(), SyntaxKind::RBrace | SyntaxKind::Eof) {
            text.push_str(self.bump());
        }
        if self.peek() == SyntaxKind::RBrace {
            self.bump();
        }
        self.builder.finish_node();
        text
    }
}

pub struct ParseResult {
    pub green_node: GreenNode,
    pub errors: Vec<SyntaxError>,
}

impl ParseResult {
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green_node.clone())
    }
}

pub fn parse(input: &str) -> ParseResult {
    Parser::new(input).parse()
}
