//! Ruby spec files for `specifications/<full-name>.gemspec`.
//!
//! The installer writes a `Gem::Specification.new` block that the Ruby side
//! can `eval`, and can read the same subset back:
//! ```text
//! Gem::Specification.new do |s|
//!   s.name = "sample"
//!   s.version = "1.0"
//!   s.require_paths = ["lib"]
//!   s.bindir = "bin"
//!
//!   s.add_runtime_dependency "rake", [">= 0"]
//! end
//! ```
//! Reading accepts RubyGems' own `"x".freeze` and `%q<x>` spellings.

use crate::gem::{Dependency, DependencyKind, Gem, DEFAULT_BINDIR, DEFAULT_PLATFORM};
use std::fmt::Write as _;
use thiserror::Error;

/// Errors that can occur when reading a spec file.
#[derive(Error, Debug)]
pub enum SpecFileError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl Gem {
    /// Render this gem as a Ruby spec file.
    #[must_use]
    pub fn to_gemspec(&self) -> String {
        let mut out = String::new();
        out.push_str("# -*- encoding: utf-8 -*-\n");
        // RubyGems separates require paths in the stub line with NUL
        let _ = writeln!(
            out,
            "# stub: {} {} {} {}",
            stub_field(&self.name),
            stub_field(&self.version),
            stub_field(self.platform()),
            self.require_paths
                .iter()
                .map(|path| stub_field(path))
                .collect::<Vec<_>>()
                .join("\0")
        );
        out.push('\n');
        out.push_str("Gem::Specification.new do |s|\n");
        let _ = writeln!(out, "  s.name = {}", ruby_string(&self.name));
        let _ = writeln!(out, "  s.version = {}", ruby_string(&self.version));
        if let Some(platform) = &self.platform {
            let _ = writeln!(out, "  s.platform = {}", ruby_string(platform));
        }
        out.push('\n');
        let _ = writeln!(out, "  s.require_paths = {}", ruby_array(&self.require_paths));
        let _ = writeln!(out, "  s.bindir = {}", ruby_string(&self.bindir));

        if !self.dependencies.is_empty() {
            out.push('\n');
            for dep in &self.dependencies {
                let _ = writeln!(
                    out,
                    "  s.add_{}_dependency {}, {}",
                    dep.kind.as_str(),
                    ruby_string(&dep.name),
                    ruby_array(&dep.requirements)
                );
            }
        }

        out.push_str("end\n");
        out
    }

    /// Read a spec file written by [`Gem::to_gemspec`].
    ///
    /// Fields other than name, version, platform, require paths, bindir and
    /// dependencies are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a known field cannot be parsed or name/version are missing.
    pub fn from_gemspec(content: &str) -> Result<Self, SpecFileError> {
        let mut name = None;
        let mut version = None;
        let mut platform = None;
        let mut require_paths = None;
        let mut bindir = None;
        let mut dependencies = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty()
                || text.starts_with('#')
                || text == "end"
                || text.starts_with("Gem::Specification.new")
            {
                continue;
            }

            let Some(rest) = text.strip_prefix("s.") else {
                return Err(syntax(line, format!("unexpected statement '{text}'")));
            };

            let ident_len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let (ident, args) = rest.split_at(ident_len);
            let mut cursor = Cursor::new(args, line);

            let kind = match ident {
                "add_runtime_dependency" | "add_dependency" => Some(DependencyKind::Runtime),
                "add_development_dependency" => Some(DependencyKind::Development),
                _ => None,
            };
            if let Some(kind) = kind {
                let wrapped = cursor.eat('(');
                let dep_name = cursor.string()?;
                let mut requirements = Vec::new();
                while cursor.eat(',') {
                    if cursor.peek() == Some('[') {
                        requirements.extend(cursor.string_array()?);
                    } else {
                        requirements.push(cursor.string()?);
                    }
                }
                if wrapped && !cursor.eat(')') {
                    return Err(syntax(line, "expected ')'"));
                }
                cursor.finish()?;
                dependencies.push(Dependency {
                    name: dep_name,
                    requirements,
                    kind,
                });
                continue;
            }

            if !cursor.eat('=') {
                return Err(syntax(line, format!("expected '=' after 's.{ident}'")));
            }
            match ident {
                "name" => name = Some(cursor.string()?),
                "version" => version = Some(cursor.string()?),
                "platform" => platform = Some(cursor.string()?),
                "bindir" => bindir = Some(cursor.string()?),
                "require_paths" => require_paths = Some(cursor.string_array()?),
                _ => continue,
            }
            cursor.finish()?;
        }

        let mut gem = Self::new(
            name.filter(|n| !n.is_empty())
                .ok_or(SpecFileError::MissingField("name"))?,
            version
                .filter(|v| !v.is_empty())
                .ok_or(SpecFileError::MissingField("version"))?,
        );
        gem.platform = platform.filter(|p| !p.is_empty() && p != DEFAULT_PLATFORM);
        gem.bindir = bindir
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BINDIR.to_string());
        if let Some(paths) = require_paths {
            gem.require_paths = paths;
        }
        gem.dependencies = dependencies;
        Ok(gem)
    }
}

fn syntax(line: usize, message: impl Into<String>) -> SpecFileError {
    SpecFileError::Syntax {
        line,
        message: message.into(),
    }
}

/// A double-quoted Ruby string literal.
fn ruby_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '#' => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A value for the `# stub:` comment, with control characters escaped so the
/// comment stays on one line.
fn stub_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

fn ruby_array(values: &[String]) -> String {
    let items: Vec<_> = values.iter().map(|v| ruby_string(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Scanner over the right-hand side of a spec file statement.
struct Cursor<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a str, line: usize) -> Self {
        Self { rest, line }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest.chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn error(&self, message: impl Into<String>) -> SpecFileError {
        syntax(self.line, message)
    }

    /// Parse `"..."`, `'...'` or `%q<...>`, with an optional `.freeze`.
    fn string(&mut self) -> Result<String, SpecFileError> {
        self.skip_ws();
        let src = self.rest;
        let mut chars = src.char_indices();
        let (quote, close) = match chars.next() {
            Some((_, '"')) => ('"', '"'),
            Some((_, '\'')) => ('\'', '\''),
            Some((_, '%')) if src.starts_with("%q<") => {
                chars.next();
                chars.next();
                ('<', '>')
            }
            _ => return Err(self.error("expected a string literal")),
        };

        let mut value = String::new();
        let mut end = None;
        while let Some((i, c)) = chars.next() {
            if c == close {
                end = Some(i + c.len_utf8());
                break;
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some((_, escaped)) = chars.next() else {
                break;
            };
            match (quote, escaped) {
                ('"', 'n') => value.push('\n'),
                ('"', 'r') => value.push('\r'),
                ('"', 't') => value.push('\t'),
                ('"', '0') => value.push('\0'),
                ('"', other) => value.push(other),
                (_, other) if other == close || other == '\\' => value.push(other),
                (_, other) => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }

        let end = end.ok_or_else(|| self.error("unterminated string literal"))?;
        self.rest = &src[end..];
        if let Some(rest) = self.rest.strip_prefix(".freeze") {
            self.rest = rest;
        }
        Ok(value)
    }

    /// Parse `[string, string, ...]`.
    fn string_array(&mut self) -> Result<Vec<String>, SpecFileError> {
        if !self.eat('[') {
            return Err(self.error("expected '['"));
        }
        let mut items = Vec::new();
        if self.eat(']') {
            return Ok(items);
        }
        loop {
            items.push(self.string()?);
            if self.eat(']') {
                return Ok(items);
            }
            if !self.eat(',') {
                return Err(self.error("expected ',' or ']'"));
            }
        }
    }

    fn finish(&mut self) -> Result<(), SpecFileError> {
        self.skip_ws();
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected trailing input '{}'", self.rest)))
        }
    }
}
