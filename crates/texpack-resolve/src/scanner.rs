//! Directive Scanner: finds file references in LaTeX source text.
//!
//! Scanning walks the syntax tree produced by [`texpack_syntax::parse`].
//! Directives are found wherever they occur, including inside the brace
//! arguments of unknown wrapper macros (`\ifdraft{}{\input{appendix}}`),
//! which is what stands in for macro expansion here. Each level of brace
//! nesting counts as one level of re-scan depth; content nested deeper than
//! [`DirectiveScanner::max_depth`] is not examined.
//!
//! Comments, `\verb` and verbatim-like environments are opaque.

use crate::directive::{Directive, DirectiveArgument, DirectiveKind};
use line_index::LineIndex;
use rowan::{NodeOrToken, SyntaxNodeChildren};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use texpack_syntax::{parse, SyntaxKind, SyntaxNode, TexLanguage};

/// Default brace-nesting depth searched for wrapped directives.
pub const DEFAULT_MAX_SCAN_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct DirectiveScanner {
    pub max_depth: usize,
}

impl Default for DirectiveScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCAN_DEPTH)
    }
}

impl DirectiveScanner {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Returns a lazy iterator over the directives in `text`.
    ///
    /// `source_file` is only recorded on each directive; nothing is read.
    pub fn scan(&self, source_file: &Path, text: &str) -> Directives {
        let root = parse(text).syntax();
        Directives {
            stack: vec![(root.children(), 0)],
            pending: VecDeque::new(),
            max_depth: self.max_depth,
            line_index: LineIndex::new(text),
            source_file: source_file.to_path_buf(),
        }
    }
}

/// Iterator returned by [`DirectiveScanner::scan`].
pub struct Directives {
    stack: Vec<(SyntaxNodeChildren<TexLanguage>, usize)>,
    pending: VecDeque<Directive>,
    max_depth: usize,
    line_index: LineIndex,
    source_file: PathBuf,
}

impl Iterator for Directives {
    type Item = Directive;

    fn next(&mut self) -> Option<Directive> {
        loop {
            if let Some(directive) = self.pending.pop_front() {
                return Some(directive);
            }

            let (node, depth) = {
                let (children, depth) = self.stack.last_mut()?;
                (children.next(), *depth)
            };
            let Some(node) = node else {
                self.stack.pop();
                continue;
            };

            match node.kind() {
                SyntaxKind::Directive => self.collect(&node),
                SyntaxKind::VerbatimEnvironment => {}
                SyntaxKind::Group | SyntaxKind::OptionalGroup => {
                    if depth < self.max_depth {
                        self.stack.push((node.children(), depth + 1));
                    } else {
                        log::debug!(
                            "{}: not re-scanning group at offset {} (depth limit {})",
                            self.source_file.display(),
                            u32::from(node.text_range().start()),
                            self.max_depth
                        );
                    }
                }
                _ => self.stack.push((node.children(), depth)),
            }
        }
    }
}

impl Directives {
    fn collect(&mut self, node: &SyntaxNode) {
        let Some(command_token) = node.first_token() else {
            return;
        };
        let command = command_token.text().trim_start_matches('\\').to_string();
        let Some(kind) = DirectiveKind::from_command(&command) else {
            return;
        };

        let start = node.text_range().start();
        let line = self.line_index.line_col(start).line + 1;
        let source_offset = u32::from(start) as usize;

        let make = |argument: DirectiveArgument| Directive {
            kind,
            command: command.clone(),
            argument,
            source_file: self.source_file.clone(),
            source_offset,
            line,
        };

        let argument_node = node
            .children()
            .find(|n| matches!(n.kind(), SyntaxKind::Group | SyntaxKind::BareArgument));
        let Some(argument_node) = argument_node else {
            self.pending
                .push_back(make(DirectiveArgument::Unresolved(String::new())));
            return;
        };

        let targets: Vec<DirectiveArgument> = if kind == DirectiveKind::GraphicsPath {
            graphics_paths(&argument_node)
        } else {
            let (text, has_macro) = argument_text(&argument_node);
            if kind.is_multi_target() {
                text.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| classify(t, t.contains('\\') && has_macro))
                    .collect()
            } else {
                vec![classify(text.trim(), has_macro)]
            }
        };

        let directives: Vec<Directive> = targets.into_iter().map(make).collect();
        self.pending.extend(directives);
    }
}

fn classify(text: &str, has_macro: bool) -> DirectiveArgument {
    if has_macro || text.is_empty() {
        DirectiveArgument::Unresolved(text.to_string())
    } else {
        DirectiveArgument::Literal(text.to_string())
    }
}

/// Collects the argument text without braces or comments, and whether it
/// contains a control sequence.
fn argument_text(node: &SyntaxNode) -> (String, bool) {
    let mut text = String::new();
    let mut has_macro = false;

    for element in node.descendants_with_tokens() {
        let NodeOrToken::Token(token) = element else {
            continue;
        };
        match token.kind() {
            SyntaxKind::Comment | SyntaxKind::LBrace | SyntaxKind::RBrace => {}
            SyntaxKind::Whitespace => text.push(' '),
            SyntaxKind::Command | SyntaxKind::Verbatim => {
                has_macro = true;
                text.push_str(token.text());
            }
            _ => text.push_str(token.text()),
        }
    }

    (text, has_macro)
}

/// `\graphicspath{{figs/}{img/}}` lists one directory per inner group.
fn graphics_paths(node: &SyntaxNode) -> Vec<DirectiveArgument> {
    node.children()
        .filter(|n| n.kind() == SyntaxKind::Group)
        .map(|group| {
            let (text, has_macro) = argument_text(&group);
            classify(text.trim(), has_macro)
        })
        .collect()
}
