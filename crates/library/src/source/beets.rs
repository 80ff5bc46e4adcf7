use super::Query;
use super::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Queries a beets library through the `beet` command line.
#[derive(Clone, Debug)]
pub struct Beets {
    binary: PathBuf,
    library: Option<PathBuf>,
}

impl Beets {
    pub fn new(binary: impl Into<PathBuf>, library: Option<PathBuf>) -> Self {
        Self { binary: binary.into(), library }
    }

    /// Locate `beet` on `PATH`. `library` selects a database other than the
    /// one in the user's beets configuration.
    pub fn discover(library: Option<PathBuf>) -> Result<Self> {
        match which::which("beet") {
            Ok(binary) => {
                tracing::debug!(beet = %binary.display(), "Discovered beets");
                Ok(Self { binary, library })
            },
            Err(_) => {
                tracing::info!("beet executable not found in PATH");
                exn::bail!(ErrorKind::QueryToolNotFound);
            },
        }
    }

    fn args(&self, query: &str) -> Result<Vec<String>> {
        let mut args = Vec::new();
        if let Some(library) = &self.library {
            args.push("-l".to_string());
            args.push(library.to_string_lossy().into_owned());
        }
        args.extend(["ls".to_string(), "-p".to_string()]);
        args.extend(split_terms(query)?);
        Ok(args)
    }
}

impl Query for Beets {
    #[tracing::instrument(level = "trace", skip(self))]
    fn query(&self, query: &str) -> Result<Vec<PathBuf>> {
        let output = Command::new(&self.binary)
            .args(self.args(query)?)
            .stdin(Stdio::null())
            .output()
            .or_raise(|| ErrorKind::Spawn(self.binary.clone()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            exn::bail!(ErrorKind::QueryFailed(query.to_string(), stderr));
        }
        let paths: Vec<PathBuf> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        tracing::debug!(query, tracks = paths.len(), "Resolved query");
        Ok(paths)
    }
}

/// Split a query string into terms the way a POSIX shell would: whitespace
/// separates terms, quotes group them, backslash escapes the next character
/// (except inside single quotes).
pub fn split_terms(query: &str) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_term = false;
    let mut chars = query.chars();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_term {
                    terms.push(std::mem::take(&mut current));
                    in_term = false;
                }
            },
            '\'' => {
                in_term = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => exn::bail!(ErrorKind::QuerySyntax(query.to_string())),
                    }
                }
            },
            '"' => {
                in_term = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            },
                            None => exn::bail!(ErrorKind::QuerySyntax(query.to_string())),
                        },
                        Some(c) => current.push(c),
                        None => exn::bail!(ErrorKind::QuerySyntax(query.to_string())),
                    }
                }
            },
            '\\' => match chars.next() {
                Some(c) => {
                    in_term = true;
                    current.push(c);
                },
                None => exn::bail!(ErrorKind::QuerySyntax(query.to_string())),
            },
            c => {
                in_term = true;
                current.push(c);
            },
        }
    }
    if in_term {
        terms.push(current);
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    #[rstest]
    #[case("", &[])]
    #[case("   ", &[])]
    #[case("artist:Queen", &["artist:Queen"])]
    #[case("artist:Queen year:1975", &["artist:Queen", "year:1975"])]
    #[case("  album:'A Night at the Opera'  ", &["album:A Night at the Opera"])]
    #[case(r#"title:"Don't Stop Me Now""#, &["title:Don't Stop Me Now"])]
    #[case(r#"title:"say \"hi\"""#, &[r#"title:say "hi""#])]
    #[case(r"path:My\ Music", &["path:My Music"])]
    #[case("''", &[""])]
    #[case("a''b", &["ab"])]
    fn test_split_terms(#[case] query: &str, #[case] expected: &[&str]) {
        assert_eq!(split_terms(query).unwrap(), expected);
    }

    #[rstest]
    #[case("album:'unterminated")]
    #[case(r#"title:"unterminated"#)]
    #[case(r"dangling\")]
    fn test_split_terms_malformed(#[case] query: &str) {
        let err = split_terms(query).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::QuerySyntax(_)));
    }

    #[test]
    fn test_args() {
        let beets = Beets::new("/usr/bin/beet", Some(PathBuf::from("/music/library.db")));
        assert_eq!(beets.args("artist:'Pink Floyd'").unwrap(), ["-l", "/music/library.db", "ls", "-p", "artist:Pink Floyd"]);
        let beets = Beets::new("/usr/bin/beet", None);
        assert_eq!(beets.args("year:1979").unwrap(), ["ls", "-p", "year:1979"]);
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let beets = Beets::new("/nonexistent/cdman-test/beet", None);
        let err = beets.query("artist:Queen").unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Spawn(_)));
    }
}
