//! Field paths and projection specs.

use std::fmt;
use std::str::FromStr;

use super::ProjectionError;

/// A path to a (possibly nested) field, e.g. `addr.city` or `addr/city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dot or slash delimited path. Every segment must be non-empty.
    pub fn parse(path: &str) -> Result<Self, ProjectionError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ProjectionError::EmptyPath(path.to_string()));
        }
        let segments: Vec<String> = trimmed
            .split(['.', '/'])
            .map(|s| s.trim().to_string())
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(ProjectionError::EmptyPath(path.to_string()));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for FieldPath {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Ordered set of field paths to materialize.
///
/// An empty spec requests the whole record as a single opaque value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSpec {
    paths: Vec<FieldPath>,
}

impl ProjectionSpec {
    /// The whole-record projection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(paths: Vec<FieldPath>) -> Result<Self, ProjectionError> {
        for (i, path) in paths.iter().enumerate() {
            if paths[..i].contains(path) {
                return Err(ProjectionError::DuplicatePath(path.to_string()));
            }
        }
        Ok(Self { paths })
    }

    /// Parse each string as a [`FieldPath`].
    pub fn parse<I, S>(paths: I) -> Result<Self, ProjectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = paths
            .into_iter()
            .map(|p| FieldPath::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(paths)
    }

    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimiters() {
        let dotted = FieldPath::parse("addr.city").unwrap();
        let slashed = FieldPath::parse("addr/city").unwrap();
        assert_eq!(dotted, slashed);
        assert_eq!(dotted.segments(), ["addr", "city"]);
        assert_eq!(slashed.to_string(), "addr.city");
    }

    #[test]
    fn test_empty_segments_rejected() {
        for bad in ["", "  ", "addr.", ".addr", "a..b", "a/"] {
            assert!(
                matches!(FieldPath::parse(bad), Err(ProjectionError::EmptyPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_spec_keeps_order() {
        let spec = ProjectionSpec::parse(["tags", "addr.city", "name"]).unwrap();
        let got: Vec<String> = spec.paths().iter().map(ToString::to_string).collect();
        assert_eq!(got, vec!["tags", "addr.city", "name"]);
    }

    #[test]
    fn test_duplicate_paths_rejected() {
        let err = ProjectionSpec::parse(["addr.city", "addr/city"]).unwrap_err();
        assert_eq!(err, ProjectionError::DuplicatePath("addr.city".to_string()));
    }

    #[test]
    fn test_all_is_empty() {
        assert!(ProjectionSpec::all().is_empty());
        assert_eq!(ProjectionSpec::parse(Vec::<String>::new()).unwrap(), ProjectionSpec::all());
    }
}
