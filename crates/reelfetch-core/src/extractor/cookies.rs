//! Netscape cookie jar validation
//!
//! Each cookie line carries 7 tab-separated fields: domain, include-subdomains
//! flag, path, secure flag, expiry epoch, name, value. Blank lines and `#`
//! comments are skipped; `#HttpOnly_` prefixed lines are cookies. A malformed
//! line is recorded as an issue and parsing continues with the next line.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const FIELD_COUNT: usize = 7;
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Errors reading a cookie jar from disk
#[derive(Error, Debug)]
pub enum CookieError {
    /// The file does not exist
    #[error("Cookie file not found: {0}")]
    NotFound(PathBuf),
    /// The file exists but could not be read as text
    #[error("Failed to read cookie file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// One parsed cookie line
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie domain
    pub domain: String,
    /// Include-subdomains flag
    pub include_subdomains: bool,
    /// Cookie path
    pub path: String,
    /// Secure-only flag
    pub secure: bool,
    /// Expiry as Unix epoch, `None` when not numeric
    pub expires: Option<i64>,
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Line carried the `#HttpOnly_` prefix
    pub http_only: bool,
}

// Values are session secrets, keep them out of logs
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("expires", &self.expires)
            .field("value", &"[MASKED]")
            .finish_non_exhaustive()
    }
}

impl Cookie {
    /// Expired at `now` (Unix seconds); expiry 0 marks a session cookie
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires, Some(exp) if exp > 0 && exp < now)
    }
}

/// Why a line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineIssueKind {
    /// No tab at all, usually spaces used as separators
    NoTabs,
    /// Tab-separated but not exactly 7 fields
    WrongFieldCount(usize),
}

impl fmt::Display for LineIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTabs => f.write_str("no tabs found - using spaces instead"),
            Self::WrongFieldCount(n) => {
                write!(f, "wrong number of fields: {n} (should be {FIELD_COUNT})")
            }
        }
    }
}

/// A rejected line, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineIssue {
    /// Line number in the file
    pub line: usize,
    /// Reason
    pub kind: LineIssueKind,
}

/// Parse result: accepted cookies and rejected lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJarReport {
    /// Accepted cookies in file order
    pub cookies: Vec<Cookie>,
    /// Rejected lines in file order
    pub issues: Vec<LineIssue>,
}

impl CookieJarReport {
    /// Usable as credentials: at least one cookie and no malformed lines
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.cookies.is_empty() && self.issues.is_empty()
    }

    /// Find a cookie by name
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Number of cookies expired at `now`
    #[must_use]
    pub fn expired_count(&self, now: i64) -> usize {
        self.cookies.iter().filter(|c| c.is_expired_at(now)).count()
    }
}

fn parse_flag(field: &str) -> bool {
    field.eq_ignore_ascii_case("TRUE")
}

fn parse_line(line: &str) -> Result<Cookie, LineIssueKind> {
    let (body, http_only) = line
        .strip_prefix(HTTP_ONLY_PREFIX)
        .map_or((line, false), |rest| (rest, true));

    if !body.contains('\t') {
        return Err(LineIssueKind::NoTabs);
    }

    let fields: Vec<&str> = body.split('\t').collect();
    let [domain, include_subdomains, path, secure, expires, name, value] = fields[..] else {
        return Err(LineIssueKind::WrongFieldCount(fields.len()));
    };

    Ok(Cookie {
        domain: domain.to_string(),
        include_subdomains: parse_flag(include_subdomains),
        path: path.to_string(),
        secure: parse_flag(secure),
        expires: expires.trim().parse().ok(),
        name: name.to_string(),
        value: value.to_string(),
        http_only,
    })
}

/// Validate cookie jar text line by line.
///
/// # Examples
///
/// ```
/// use reelfetch_core::extractor::cookies::parse_cookie_jar;
///
/// let text = "# Netscape HTTP Cookie File\n\
///             .instagram.com\tTRUE\t/\tTRUE\t1735689600\tsessionid\tabc\n";
/// let report = parse_cookie_jar(text);
/// assert!(report.is_usable());
/// assert_eq!(report.cookies[0].name, "sessionid");
/// ```
#[must_use]
pub fn parse_cookie_jar(text: &str) -> CookieJarReport {
    let mut report = CookieJarReport::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed.starts_with('#') && !trimmed.starts_with(HTTP_ONLY_PREFIX))
        {
            continue;
        }

        match parse_line(line.trim_start()) {
            Ok(cookie) => report.cookies.push(cookie),
            Err(kind) => {
                debug!(line = idx + 1, issue = %kind, "Rejected cookie line");
                report.issues.push(LineIssue {
                    line: idx + 1,
                    kind,
                });
            }
        }
    }

    report
}

/// Read and validate a cookie jar file.
///
/// # Errors
///
/// Returns [`CookieError::NotFound`] if the file is missing and
/// [`CookieError::Read`] for other I/O failures.
pub async fn inspect_cookie_file(path: &Path) -> Result<CookieJarReport, CookieError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(parse_cookie_jar(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CookieError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(CookieError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// First existing candidate with its report, in candidate order
pub async fn find_cookie_file(candidates: &[PathBuf]) -> Option<(PathBuf, CookieJarReport)> {
    for candidate in candidates {
        match inspect_cookie_file(candidate).await {
            Ok(report) => return Some((candidate.clone(), report)),
            Err(CookieError::NotFound(_)) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable cookie file"),
        }
    }
    None
}
