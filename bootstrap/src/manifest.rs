//! Dependency manifest parsing.
//!
//! A manifest is a plain text file with one requirement per line, the format
//! the install step consumes: a package name optionally followed by
//! comma-separated version specifiers (`flask==2.0.0`, `click>=8.0,<9.0`).
//! Blank lines and `#` comments are ignored. Requirements form an unordered
//! set; install order follows file order but carries no meaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::{BootstrapError, BootstrapResult};

/// Comparison operators allowed in a version specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionOp {
    Exact,
    NotEqual,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    Compatible,
}

impl VersionOp {
    /// The operator as it appears in a manifest line.
    pub fn symbol(&self) -> &'static str {
        match self {
            VersionOp::Exact => "==",
            VersionOp::NotEqual => "!=",
            VersionOp::GreaterEq => ">=",
            VersionOp::LessEq => "<=",
            VersionOp::Greater => ">",
            VersionOp::Less => "<",
            VersionOp::Compatible => "~=",
        }
    }

    // Two-character operators must be tried before `>` and `<`.
    fn strip(token: &str) -> Option<(VersionOp, &str)> {
        const TWO_CHAR: [(&str, VersionOp); 5] = [
            ("==", VersionOp::Exact),
            ("!=", VersionOp::NotEqual),
            (">=", VersionOp::GreaterEq),
            ("<=", VersionOp::LessEq),
            ("~=", VersionOp::Compatible),
        ];
        for (symbol, op) in TWO_CHAR {
            if let Some(rest) = token.strip_prefix(symbol) {
                return Some((op, rest));
            }
        }
        if let Some(rest) = token.strip_prefix('>') {
            return Some((VersionOp::Greater, rest));
        }
        if let Some(rest) = token.strip_prefix('<') {
            return Some((VersionOp::Less, rest));
        }
        None
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single version constraint, e.g. `==2.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    pub op: VersionOp,
    pub version: String,
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

/// One declared dependency: a package name plus zero or more version specs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub specs: Vec<VersionSpec>,
}

impl Requirement {
    /// A requirement with no version constraint.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: Vec::new(),
        }
    }

    /// A requirement pinned to exactly one version.
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: vec![VersionSpec {
                op: VersionOp::Exact,
                version: version.into(),
            }],
        }
    }

    /// Parse a single manifest line (comments already stripped).
    pub fn parse(line: &str) -> BootstrapResult<Self> {
        let text = line.trim();
        let split_at = text
            .find(|c: char| "=<>!~".contains(c))
            .unwrap_or(text.len());
        let (name_part, spec_part) = text.split_at(split_at);
        let name = name_part.trim();
        validate_name(name).map_err(|reason| BootstrapError::DependencyResolution {
            package: text.to_string(),
            reason,
        })?;

        let mut specs = Vec::new();
        let spec_part = spec_part.trim();
        if !spec_part.is_empty() {
            for token in spec_part.split(',') {
                let token = token.trim();
                let (op, version) =
                    VersionOp::strip(token).ok_or_else(|| BootstrapError::DependencyResolution {
                        package: name.to_string(),
                        reason: format!("unrecognized version specifier '{token}'"),
                    })?;
                let version = version.trim();
                if version.is_empty() || version.contains(char::is_whitespace) {
                    return Err(BootstrapError::DependencyResolution {
                        package: name.to_string(),
                        reason: format!("missing or malformed version in '{token}'"),
                    });
                }
                specs.push(VersionSpec {
                    op,
                    version: version.to_string(),
                });
            }
        }

        Ok(Requirement {
            name: name.to_string(),
            specs,
        })
    }

    pub fn is_pinned(&self) -> bool {
        self.specs.iter().any(|s| s.op == VersionOp::Exact)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{spec}")?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("missing package name".to_string());
    }
    if !name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err("package name must start with a letter or digit".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(format!("invalid character in package name '{name}'"));
    }
    if !name.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err("package name must end with a letter or digit".to_string());
    }
    Ok(())
}

fn strip_comment(raw: &str) -> &str {
    if raw.trim_start().starts_with('#') {
        return "";
    }
    match raw.find(" #") {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

/// A parsed dependency manifest.
///
/// Requirements keep file order for deterministic installs, but duplicate
/// package names are merged into one entry. Two different exact pins for the
/// same package are rejected at parse time rather than surfacing later as an
/// install failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    requirements: Vec<Requirement>,
}

impl Manifest {
    pub fn parse(content: &str) -> BootstrapResult<Self> {
        let mut requirements: Vec<Requirement> = Vec::new();
        for (index, raw) in content.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let parsed = Requirement::parse(line).map_err(|e| at_line(e, index + 1))?;
            match requirements.iter_mut().find(|r| r.name == parsed.name) {
                Some(existing) => merge_specs(existing, parsed.specs, index + 1)?,
                None => requirements.push(parsed),
            }
        }
        Ok(Manifest { requirements })
    }

    pub fn from_path(path: impl AsRef<Path>) -> BootstrapResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.requirements.iter().any(|r| r.name == name)
    }
}

fn at_line(error: BootstrapError, line: usize) -> BootstrapError {
    match error {
        BootstrapError::DependencyResolution { package, reason } => {
            BootstrapError::DependencyResolution {
                package,
                reason: format!("{reason} (line {line})"),
            }
        }
        other => other,
    }
}

fn merge_specs(
    existing: &mut Requirement,
    specs: Vec<VersionSpec>,
    line: usize,
) -> BootstrapResult<()> {
    for spec in specs {
        if existing.specs.contains(&spec) {
            continue;
        }
        if spec.op == VersionOp::Exact {
            if let Some(pin) = existing
                .specs
                .iter()
                .find(|s| s.op == VersionOp::Exact && s.version != spec.version)
            {
                return Err(BootstrapError::DependencyResolution {
                    package: existing.name.clone(),
                    reason: format!("conflicting pins {pin} and {spec} (line {line})"),
                });
            }
        }
        existing.specs.push(spec);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pinned_requirement() {
        let req = Requirement::parse("flask==2.0.0").unwrap();
        assert_eq!(req.name, "flask");
        assert_eq!(req.specs.len(), 1);
        assert_eq!(req.specs[0].op, VersionOp::Exact);
        assert_eq!(req.specs[0].version, "2.0.0");
        assert!(req.is_pinned());
    }

    #[test]
    fn test_parse_bare_requirement() {
        let req = Requirement::parse("requests").unwrap();
        assert_eq!(req.name, "requests");
        assert!(req.specs.is_empty());
        assert!(!req.is_pinned());
    }

    #[test]
    fn test_parse_range_requirement() {
        let req = Requirement::parse("click>=8.0,<9.0").unwrap();
        assert_eq!(req.name, "click");
        assert_eq!(req.specs.len(), 2);
        assert_eq!(req.specs[0].op, VersionOp::GreaterEq);
        assert_eq!(req.specs[1].op, VersionOp::Less);
    }

    #[test]
    fn test_parse_tolerates_inner_whitespace() {
        let req = Requirement::parse("flask == 2.0.0").unwrap();
        assert_eq!(req.name, "flask");
        assert_eq!(req.specs[0].version, "2.0.0");
    }

    #[test]
    fn test_parse_compatible_release() {
        let req = Requirement::parse("werkzeug~=2.0").unwrap();
        assert_eq!(req.specs[0].op, VersionOp::Compatible);
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        let err = Requirement::parse("flask==").unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::DependencyResolution { ref package, .. } if package == "flask"
        ));
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        assert!(Requirement::parse("==2.0.0").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_name_characters() {
        assert!(Requirement::parse("flask[extras]==1.0").is_err());
        assert!(Requirement::parse("-flask").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let req = Requirement::parse("click>=8.0,<9.0").unwrap();
        assert_eq!(req.to_string(), "click>=8.0,<9.0");
        assert_eq!(Requirement::exact("flask", "2.0.0").to_string(), "flask==2.0.0");
        assert_eq!(Requirement::any("requests").to_string(), "requests");
    }

    #[test]
    fn test_manifest_skips_blanks_and_comments() {
        let manifest = Manifest::parse(
            "# web framework\nflask==2.0.0\n\nrequests  # http client\n",
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("flask"));
        assert!(manifest.contains("requests"));
    }

    #[test]
    fn test_manifest_empty_content() {
        let manifest = Manifest::parse("\n# nothing here\n\n").unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_manifest_merges_duplicate_names() {
        let manifest = Manifest::parse("click>=8.0\nclick<9.0\n").unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.requirements()[0].specs.len(), 2);
    }

    #[test]
    fn test_manifest_deduplicates_identical_lines() {
        let manifest = Manifest::parse("flask==2.0.0\nflask==2.0.0\n").unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.requirements()[0].specs.len(), 1);
    }

    #[test]
    fn test_manifest_rejects_conflicting_pins() {
        let err = Manifest::parse("flask==2.0.0\nflask==3.0.0\n").unwrap_err();
        match err {
            BootstrapError::DependencyResolution { package, reason } => {
                assert_eq!(package, "flask");
                assert!(reason.contains("conflicting pins"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_manifest_reports_offending_line() {
        let err = Manifest::parse("flask==2.0.0\nnot a requirement!\n").unwrap_err();
        match err {
            BootstrapError::DependencyResolution { reason, .. } => {
                assert!(reason.contains("line 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_manifest_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "flask==2.0.0\n").unwrap();
        let manifest = Manifest::from_path(&path).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.contains("flask"));
    }

    #[test]
    fn test_manifest_missing_file_is_io_error() {
        let err = Manifest::from_path("/nonexistent/requirements.txt").unwrap_err();
        assert!(matches!(err, BootstrapError::Io(_)));
    }

    #[test]
    fn test_manifest_serialization() {
        let manifest = Manifest::parse("flask==2.0.0\nrequests\n").unwrap();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest, back);
    }
}
