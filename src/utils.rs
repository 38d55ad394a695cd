use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use std::time::SystemTime;

use crate::error::{Error, ErrorKind, Result};

pub fn datetime(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Last component of a local or remote path, accepting both separators.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(trimmed)
}

/// `preferred` unless empty, else the base name of `source`.
pub fn target_name<'a>(preferred: &'a str, source: &'a str) -> &'a str {
    if preferred.is_empty() {
        base_name(source)
    } else {
        preferred
    }
}

/// Splits `logs/*.txt` into the directory to list and the name mask.
pub fn split_pattern(pattern: &str) -> (Option<&str>, &str) {
    match pattern.rfind('/') {
        Some(0) => (Some("/"), &pattern[1..]),
        Some(idx) => (Some(&pattern[..idx]), &pattern[idx + 1..]),
        None => (None, pattern),
    }
}

/// Whether `name` names an entry. A bare directory part (`""`, `logs/`)
/// does not, even though it is a valid search pattern.
pub fn names_entry(name: &str) -> bool {
    !split_pattern(name).1.is_empty()
}

/// Compiled base-name mask of a directory search.
pub struct Mask(Pattern);

impl Mask {
    /// `*.*` keeps its DOS meaning of "every name"; an empty mask too.
    pub fn new(mask: &str) -> Result<Self> {
        let mask = match mask {
            "" | "*.*" => "*",
            other => other,
        };

        Pattern::new(mask).map(Self).map_err(|e| {
            Error::new(
                ErrorKind::CommandRejected,
                format!("invalid pattern '{mask}': {e}"),
            )
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.0.matches_with(base_name(name), options)
    }
}

/// Resolves `path` against the absolute `cwd`, folding `.` and `..`.
///
/// The result is absolute and never climbs above `/`.
pub fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{cwd}/{path}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    format!("/{}", parts.join("/"))
}

/// Parent of an absolute, resolved path.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/tmp/report.txt"), "report.txt");
        assert_eq!(base_name("C:\\data\\report.txt"), "report.txt");
        assert_eq!(base_name("report.txt"), "report.txt");
        assert_eq!(base_name("logs/"), "logs");
    }

    #[test]
    fn test_target_name() {
        assert_eq!(target_name("", "/tmp/a.txt"), "a.txt");
        assert_eq!(target_name("b.txt", "/tmp/a.txt"), "b.txt");
    }

    #[test]
    fn test_split_pattern() {
        assert_eq!(split_pattern("*.txt"), (None, "*.txt"));
        assert_eq!(split_pattern("logs/*.txt"), (Some("logs"), "*.txt"));
        assert_eq!(split_pattern("/*"), (Some("/"), "*"));
    }

    #[test]
    fn test_names_entry() {
        assert!(names_entry("a.txt"));
        assert!(names_entry("logs/*.txt"));
        assert!(!names_entry(""));
        assert!(!names_entry("logs/"));
        assert!(!names_entry("/"));
    }

    #[test]
    fn test_mask() {
        let all = Mask::new("*.*").unwrap();
        assert!(all.matches("README"));
        assert!(all.matches("a.txt"));

        let text = Mask::new("*.txt").unwrap();
        assert!(text.matches("a.txt"));
        assert!(text.matches("logs/a.txt"));
        assert!(!text.matches("a.log"));

        assert!(Mask::new("[").is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/", "logs"), "/logs");
        assert_eq!(resolve("/logs", "../data/./a.txt"), "/data/a.txt");
        assert_eq!(resolve("/logs", "/etc"), "/etc");
        assert_eq!(resolve("/", "../../.."), "/");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/logs/a.txt"), "/logs");
        assert_eq!(parent("/logs"), "/");
        assert_eq!(parent("/"), "/");
    }
}
