//! Gem descriptors and the `metadata.gz` parser.
//!
//! The metadata stream of a `.gem` archive is a YAML dump of a
//! `Gem::Specification` object:
//! ```text
//! --- !ruby/object:Gem::Specification
//! name: sample
//! version: !ruby/object:Gem::Version
//!   version: '1.0'
//! platform: ruby
//! bindir: exe
//! dependencies:
//! - !ruby/object:Gem::Dependency
//!   name: rake
//!   requirement: !ruby/object:Gem::Requirement
//!     requirements:
//!     - - ">="
//!       - !ruby/object:Gem::Version
//!         version: '0'
//!   type: :runtime
//! require_paths:
//! - lib
//! ```
//! Only the fields the installer needs are extracted; everything else is ignored.

use flate2::read::GzDecoder;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::io::Read;
use thiserror::Error;

/// Platform name RubyGems uses for platform-independent gems.
pub const DEFAULT_PLATFORM: &str = "ruby";

/// Executable directory used when the metadata does not name one.
pub const DEFAULT_BINDIR: &str = "bin";

/// Require path used when the metadata does not list any.
pub const DEFAULT_REQUIRE_PATH: &str = "lib";

/// Errors that can occur while reading gem metadata.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to read metadata stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse metadata: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field '{field}' must be a string, found {found}")]
    InvalidField { field: &'static str, found: &'static str },
}

/// Whether a dependency is needed at runtime or only for development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyKind {
    #[default]
    Runtime,
    Development,
}

impl DependencyKind {
    /// Returns the kind as RubyGems spells it.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Development => "development",
        }
    }
}

/// A dependency on another gem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the required gem.
    pub name: String,

    /// Version requirements such as `">= 0"` or `"~> 1.2"`, in declaration order.
    pub requirements: Vec<String>,

    /// Runtime or development dependency.
    pub kind: DependencyKind,
}

/// Parsed metadata of a single gem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gem {
    /// Gem name.
    pub name: String,

    /// Gem version, verbatim.
    pub version: String,

    /// Platform, `None` for the default `ruby` platform.
    pub platform: Option<String>,

    /// Declared dependencies.
    pub dependencies: Vec<Dependency>,

    /// Directories, relative to the gem root, that are load roots.
    pub require_paths: Vec<String>,

    /// Directory holding the gem's executables.
    pub bindir: String,
}

impl Gem {
    /// Create a descriptor with default platform, bindir and require paths.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: None,
            dependencies: Vec::new(),
            require_paths: vec![DEFAULT_REQUIRE_PATH.to_string()],
            bindir: DEFAULT_BINDIR.to_string(),
        }
    }

    /// The `name-version[-platform]` identifier used for directory and spec file names.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.platform {
            Some(platform) => format!("{}-{}-{}", self.name, self.version, platform),
            None => format!("{}-{}", self.name, self.version),
        }
    }

    /// The platform name, falling back to [`DEFAULT_PLATFORM`].
    #[must_use]
    pub fn platform(&self) -> &str {
        self.platform.as_deref().unwrap_or(DEFAULT_PLATFORM)
    }

    /// Parse the gzip-compressed `metadata.gz` payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not valid gzip or the metadata is invalid.
    pub fn from_metadata_gz(reader: impl Read) -> Result<Self, MetadataError> {
        Self::from_reader(GzDecoder::new(reader))
    }

    /// Parse an already decompressed metadata stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read or the metadata is invalid.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, MetadataError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::from_yaml(&content)
    }

    /// Parse metadata from its YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or `name`/`version` are missing.
    pub fn from_yaml(content: &str) -> Result<Self, MetadataError> {
        let root = strip_tags(serde_yaml::from_str::<Value>(content)?);
        let Value::Mapping(root) = root else {
            return Err(MetadataError::InvalidField {
                field: "specification",
                found: value_kind(&root),
            });
        };

        let name = required(&root, "name", "name")?;

        // `version` is normally a Gem::Version object, but accept a bare scalar too
        let version = match root.get("version") {
            Some(Value::Mapping(version)) => required(version, "version", "version.version")?,
            Some(other) => text(other, "version.version")?
                .filter(|v| !v.is_empty())
                .ok_or(MetadataError::MissingField("version.version"))?,
            None => return Err(MetadataError::MissingField("version.version")),
        };

        let platform = optional(&root, "platform", "platform")?
            .filter(|p| !p.is_empty() && p != DEFAULT_PLATFORM);

        let bindir = optional(&root, "bindir", "bindir")?
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BINDIR.to_string());

        let require_paths = match root.get("require_paths") {
            Some(Value::Sequence(paths)) => paths
                .iter()
                .map(|p| scalar(p, "require_paths"))
                .filter_map(Result::transpose)
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => vec![DEFAULT_REQUIRE_PATH.to_string()],
            Some(other) => vec![scalar(other, "require_paths")?.unwrap_or_default()],
        };

        let dependencies = match root.get("dependencies") {
            Some(Value::Sequence(deps)) => deps
                .iter()
                .map(parse_dependency)
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            name,
            version,
            platform,
            dependencies,
            require_paths,
            bindir,
        })
    }
}

impl fmt::Display for Gem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

fn parse_dependency(value: &Value) -> Result<Dependency, MetadataError> {
    let Value::Mapping(dep) = value else {
        return Err(MetadataError::InvalidField {
            field: "dependencies",
            found: value_kind(value),
        });
    };

    let name = required(dep, "name", "dependencies.name")?;

    let kind = match optional(dep, "type", "dependencies.type")?.as_deref() {
        Some(":development" | "development") => DependencyKind::Development,
        _ => DependencyKind::Runtime,
    };

    let requirement = dep
        .get("requirement")
        .or_else(|| dep.get("version_requirements"))
        .and_then(|r| r.get("requirements"));

    let mut requirements = Vec::new();
    if let Some(Value::Sequence(pairs)) = requirement {
        for pair in pairs {
            let Value::Sequence(parts) = pair else {
                continue;
            };
            let op = parts
                .first()
                .map(|op| scalar(op, "dependencies.requirements"))
                .transpose()?
                .flatten();
            let version = match parts.get(1) {
                Some(Value::Mapping(v)) => optional(v, "version", "dependencies.requirements")?,
                Some(other) => scalar(other, "dependencies.requirements")?,
                None => None,
            };
            if let (Some(op), Some(version)) = (op, version) {
                requirements.push(format!("{op} {version}"));
            }
        }
    }

    Ok(Dependency {
        name,
        requirements,
        kind,
    })
}

/// Remove the `!ruby/object:...` tags Psych attaches to every object node.
fn strip_tags(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => strip_tags(tagged.value),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(strip_tags).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (strip_tags(k), strip_tags(v)))
                .collect(),
        ),
        other => other,
    }
}

fn required(map: &Mapping, key: &str, field: &'static str) -> Result<String, MetadataError> {
    map.get(key)
        .map_or(Ok(None), |v| text(v, field))?
        .filter(|v| !v.is_empty())
        .ok_or(MetadataError::MissingField(field))
}

/// Like [`scalar`], but refuses numbers: `1.10` would come back as `1.1`.
fn text(value: &Value, field: &'static str) -> Result<Option<String>, MetadataError> {
    if let Value::Number(_) = value {
        return Err(MetadataError::InvalidField {
            field,
            found: value_kind(value),
        });
    }
    scalar(value, field)
}

fn optional(map: &Mapping, key: &str, field: &'static str) -> Result<Option<String>, MetadataError> {
    map.get(key).map_or(Ok(None), |v| scalar(v, field))
}

/// Read a scalar as text. Numbers and booleans are rendered with `to_string`.
fn scalar(value: &Value, field: &'static str) -> Result<Option<String>, MetadataError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(MetadataError::InvalidField {
            field,
            found: value_kind(other),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAKE_METADATA: &str = r#"--- !ruby/object:Gem::Specification
name: rake
version: !ruby/object:Gem::Version
  version: 13.0.6
platform: ruby
authors:
- Hiroshi SHIBATA
bindir: exe
cert_chain: []
date: 2021-07-09 00:00:00.000000000 Z
dependencies:
- !ruby/object:Gem::Dependency
  name: minitest
  requirement: !ruby/object:Gem::Requirement
    requirements:
    - - ">="
      - !ruby/object:Gem::Version
        version: '5.0'
    - - "<"
      - !ruby/object:Gem::Version
        version: '6'
  type: :development
  prerelease: false
  version_requirements: !ruby/object:Gem::Requirement
    requirements:
    - - ">="
      - !ruby/object:Gem::Version
        version: '5.0'
- !ruby/object:Gem::Dependency
  name: json
  requirement: !ruby/object:Gem::Requirement
    requirements:
    - - "~>"
      - !ruby/object:Gem::Version
        version: '2.1'
  type: :runtime
  prerelease: false
executables:
- rake
require_paths:
- lib
rubygems_version: 3.2.15
specification_version: 4
summary: Rake is a Make-like program implemented in Ruby
"#;

    #[test]
    fn parse_full_metadata() {
        let gem = Gem::from_yaml(RAKE_METADATA).unwrap();
        assert_eq!(gem.name, "rake");
        assert_eq!(gem.version, "13.0.6");
        assert_eq!(gem.platform, None);
        assert_eq!(gem.bindir, "exe");
        assert_eq!(gem.require_paths, vec!["lib"]);

        assert_eq!(gem.dependencies.len(), 2);
        let minitest = &gem.dependencies[0];
        assert_eq!(minitest.name, "minitest");
        assert_eq!(minitest.kind, DependencyKind::Development);
        assert_eq!(minitest.requirements, vec![">= 5.0", "< 6"]);

        let json = &gem.dependencies[1];
        assert_eq!(json.kind, DependencyKind::Runtime);
        assert_eq!(json.requirements, vec!["~> 2.1"]);
    }

    #[test]
    fn optional_fields_get_defaults() {
        let gem = Gem::from_yaml("name: tiny\nversion:\n  version: '0.1'\n").unwrap();
        assert_eq!(gem.platform, None);
        assert_eq!(gem.bindir, DEFAULT_BINDIR);
        assert_eq!(gem.require_paths, vec![DEFAULT_REQUIRE_PATH]);
        assert!(gem.dependencies.is_empty());
    }

    #[test]
    fn unquoted_numeric_version_is_rejected() {
        let err = Gem::from_yaml("name: tiny\nversion:\n  version: 1.10\n").unwrap_err();
        assert!(matches!(
            err,
            MetadataError::InvalidField {
                field: "version.version",
                found: "a number"
            }
        ));

        let err = Gem::from_yaml("name: tiny\nversion: 2\n").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidField { .. }));
    }

    #[test]
    fn quoted_numeric_version_keeps_text() {
        let gem = Gem::from_yaml("name: tiny\nversion:\n  version: '1.10'\n").unwrap();
        assert_eq!(gem.version, "1.10");
        assert_eq!(gem.full_name(), "tiny-1.10");
    }

    #[test]
    fn numeric_name_is_rejected() {
        let err = Gem::from_yaml("name: 42\nversion:\n  version: '1.0'\n").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn bare_version_scalar_is_accepted() {
        let gem = Gem::from_yaml("name: tiny\nversion: '2.3.4'\n").unwrap();
        assert_eq!(gem.version, "2.3.4");
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = Gem::from_yaml("version:\n  version: '1.0'\n").unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("name")));
    }

    #[test]
    fn empty_name_is_an_error() {
        let err = Gem::from_yaml("name: ''\nversion:\n  version: '1.0'\n").unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("name")));
    }

    #[test]
    fn missing_version_is_an_error() {
        let err = Gem::from_yaml("name: tiny\n").unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("version.version")));

        let err = Gem::from_yaml("name: tiny\nversion: {}\n").unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("version.version")));
    }

    #[test]
    fn malformed_name_is_an_error() {
        let err = Gem::from_yaml("name: [a, b]\nversion: '1'\n").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidField { field: "name", .. }));
    }

    #[test]
    fn non_mapping_document_is_an_error() {
        let err = Gem::from_yaml("- just\n- a list\n").unwrap_err();
        assert!(matches!(err, MetadataError::InvalidField { .. }));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = Gem::from_yaml("name: [unclosed\n").unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
    }

    #[test]
    fn full_name_without_platform() {
        let gem = Gem::new("sample", "1.0");
        assert_eq!(gem.full_name(), "sample-1.0");
        assert_eq!(gem.platform(), DEFAULT_PLATFORM);
    }

    #[test]
    fn full_name_with_platform() {
        let mut gem = Gem::new("nokogiri", "1.15.4");
        gem.platform = Some("java".to_string());
        assert_eq!(gem.full_name(), "nokogiri-1.15.4-java");
        assert_eq!(gem.to_string(), "nokogiri-1.15.4-java");
    }

    #[test]
    fn ruby_platform_is_the_default() {
        let gem = Gem::from_yaml("name: a\nversion: '1'\nplatform: ruby\n").unwrap();
        assert_eq!(gem.platform, None);
        assert_eq!(gem.full_name(), "a-1");

        let gem = Gem::from_yaml("name: a\nversion: '1'\nplatform: java\n").unwrap();
        assert_eq!(gem.full_name(), "a-1-java");
    }

    #[test]
    fn gzip_metadata_stream() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(RAKE_METADATA.as_bytes()).unwrap();
        let bytes = encoder.finish().unwrap();

        let gem = Gem::from_metadata_gz(bytes.as_slice()).unwrap();
        assert_eq!(gem.full_name(), "rake-13.0.6");
    }

    #[test]
    fn corrupt_gzip_is_an_io_error() {
        let err = Gem::from_metadata_gz(&b"not gzip"[..]).unwrap_err();
        assert!(matches!(err, MetadataError::Io(_)));
    }
}
