use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What a directive asks the engine to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Input,
    Include,
    DocumentClass,
    UsePackage,
    BibliographyStyle,
    Bibliography,
    Graphics,
    /// `\graphicspath`: declares directories, names no file itself.
    GraphicsPath,
}

impl DirectiveKind {
    /// Maps a command name (without backslash) to its kind.
    pub fn from_command(command: &str) -> Option<Self> {
        let kind = match command {
            "input" | "@input" | "InputIfFileExists" | "subfile" => DirectiveKind::Input,
            "include" => DirectiveKind::Include,
            "documentclass" | "LoadClass" | "LoadClassWithOptions" => DirectiveKind::DocumentClass,
            "usepackage" | "RequirePackage" | "RequirePackageWithOptions" | "templatetype" => {
                DirectiveKind::UsePackage
            }
            "bibliographystyle" => DirectiveKind::BibliographyStyle,
            "bibliography" | "addbibresource" | "addglobalbib" => DirectiveKind::Bibliography,
            "includegraphics" | "includepdf" => DirectiveKind::Graphics,
            "graphicspath" => DirectiveKind::GraphicsPath,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether one argument may list several comma-separated targets.
    pub fn is_multi_target(self) -> bool {
        matches!(
            self,
            DirectiveKind::UsePackage | DirectiveKind::Bibliography
        )
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::Input => "input",
            DirectiveKind::Include => "include",
            DirectiveKind::DocumentClass => "documentclass",
            DirectiveKind::UsePackage => "usepackage",
            DirectiveKind::BibliographyStyle => "bibliographystyle",
            DirectiveKind::Bibliography => "bibliography",
            DirectiveKind::Graphics => "graphics",
            DirectiveKind::GraphicsPath => "graphicspath",
        };
        f.write_str(name)
    }
}

/// The argument of a directive as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum DirectiveArgument {
    /// Plain text, usable as a file name.
    Literal(String),
    /// Contains control sequences (or is missing); kept verbatim for diagnostics.
    Unresolved(String),
}

impl DirectiveArgument {
    pub fn raw(&self) -> &str {
        match self {
            DirectiveArgument::Literal(s) | DirectiveArgument::Unresolved(s) => s,
        }
    }
}

/// A file reference found in LaTeX source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Command that produced it, e.g. `RequirePackage`.
    pub command: String,
    pub argument: DirectiveArgument,
    pub source_file: PathBuf,
    /// Byte offset of the command in `source_file`.
    pub source_offset: usize,
    /// 1-based line of `source_offset`.
    pub line: u32,
}

impl Directive {
    pub fn raw_argument(&self) -> &str {
        self.argument.raw()
    }

    pub fn is_static(&self) -> bool {
        matches!(self.argument, DirectiveArgument::Literal(_))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: \\{}{{{}}}",
            self.source_file.display(),
            self.line,
            self.command,
            self.raw_argument()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        assert_eq!(DirectiveKind::from_command("input"), Some(DirectiveKind::Input));
        assert_eq!(
            DirectiveKind::from_command("RequirePackage"),
            Some(DirectiveKind::UsePackage)
        );
        assert_eq!(
            DirectiveKind::from_command("LoadClass"),
            Some(DirectiveKind::DocumentClass)
        );
        assert_eq!(
            DirectiveKind::from_command("addbibresource"),
            Some(DirectiveKind::Bibliography)
        );
        assert_eq!(DirectiveKind::from_command("section"), None);
    }

    #[test]
    fn test_every_parser_directive_has_a_kind() {
        for command in texpack_syntax::parser::DIRECTIVE_COMMANDS {
            assert!(
                DirectiveKind::from_command(command).is_some(),
                "no kind for \\{}",
                command
            );
        }
    }

    #[test]
    fn test_multi_target_kinds() {
        assert!(DirectiveKind::UsePackage.is_multi_target());
        assert!(DirectiveKind::Bibliography.is_multi_target());
        assert!(!DirectiveKind::Input.is_multi_target());
        assert!(!DirectiveKind::DocumentClass.is_multi_target());
    }

    #[test]
    fn test_serialized_kind_names() {
        let json = serde_json::to_string(&DirectiveKind::BibliographyStyle).unwrap();
        assert_eq!(json, "\"bibliography_style\"");
    }
}
