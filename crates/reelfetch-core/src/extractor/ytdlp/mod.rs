//! YT-DLP Strategy - media download via the yt-dlp executable
//!
//! Runs yt-dlp once per request inside a private scratch directory, reads
//! the produced file into memory and removes the directory afterwards.
//!
//! Error classification matches substrings of yt-dlp's error text, so it
//! depends on yt-dlp's exact wording.

pub mod runner;
pub mod scratch;

use crate::config::FetchSettings;
use crate::extractor::cookies::{inspect_cookie_file, CookieError};
use crate::extractor::strategy::{ExtractionStrategy, StrategyError};
use crate::extractor::types::RawPayload;
use async_trait::async_trait;
use bytes::Bytes;
use runner::{CommandRunner, ProcessRunner};
use scratch::{extension_of, ScratchDir, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Format requested after a format error
pub const DEGRADED_FORMAT: &str = "best";

/// Title used when yt-dlp reports none
const FALLBACK_TITLE: &str = "Instagram content";

/// Output template inside the scratch directory
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Credentials file written for username/password logins
const NETRC_FILE: &str = "auth.netrc";
/// netrc machine name yt-dlp looks up for Instagram
const NETRC_MACHINE: &str = "instagram";

/// Coarse URL shape, only used to pick a format preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    /// `/stories/` links
    Story,
    /// `/p/` and `/reel/` links
    PostOrReel,
    /// Anything else
    Unspecified,
}

impl UrlShape {
    /// Classify a URL by path pattern
    #[must_use]
    pub fn classify(url: &str) -> Self {
        if url.contains("/stories/") {
            Self::Story
        } else if url.contains("/p/") || url.contains("/reel/") {
            Self::PostOrReel
        } else {
            Self::Unspecified
        }
    }

    /// yt-dlp `-f` selector for this shape
    #[must_use]
    pub const fn format_preference(self) -> &'static str {
        match self {
            Self::Story => "best[ext=mp4]/best",
            Self::PostOrReel => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            Self::Unspecified => "bestvideo+bestaudio/best",
        }
    }
}

/// Credentials handed to yt-dlp
#[derive(Clone, PartialEq, Eq)]
enum Credentials {
    CookieFile(PathBuf),
    Login { username: String, password: String },
    Anonymous,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CookieFile(path) => f.debug_tuple("CookieFile").field(path).finish(),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl Credentials {
    /// yt-dlp arguments for these credentials.
    ///
    /// A login is written to an owner-only netrc file inside `scratch` so the
    /// password never appears on the command line.
    async fn to_args(&self, scratch: &ScratchDir) -> Result<Vec<String>, StrategyError> {
        match self {
            Self::CookieFile(path) => Ok(vec![
                "--cookies".to_string(),
                path.to_string_lossy().into_owned(),
            ]),
            Self::Login { username, password } => {
                let path = scratch.path().join(NETRC_FILE);
                let entry = format!("machine {NETRC_MACHINE} login {username} password {password}\n");
                write_private_file(&path, &entry).await?;
                Ok(vec![
                    "--netrc".to_string(),
                    "--netrc-location".to_string(),
                    path.to_string_lossy().into_owned(),
                ])
            }
            Self::Anonymous => Ok(Vec::new()),
        }
    }
}

async fn write_private_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

/// Subset of the yt-dlp info JSON we use
#[derive(Debug, Default, Deserialize)]
struct YtdlpInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
    #[serde(default)]
    filepath: Option<String>,
    #[serde(default, rename = "_filename")]
    underscore_filename: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RequestedDownload {
    #[serde(default)]
    filepath: Option<String>,
}

impl YtdlpInfo {
    /// Parse the first JSON line of yt-dlp's stdout; carousels print one per item
    fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str(line).ok())
    }

    /// Reported file locations, most specific first
    fn reported_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.requested_downloads
            .iter()
            .filter_map(|d| d.filepath.as_deref())
            .chain(self.filepath.as_deref())
            .chain(self.underscore_filename.as_deref())
            .chain(self.filename.as_deref())
            .map(PathBuf::from)
    }

    fn non_empty(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }
}

/// Map yt-dlp error text onto the strategy error taxonomy
#[must_use]
pub fn classify_error(message: &str, shape: UrlShape) -> StrategyError {
    let lowered = message.to_lowercase();
    if lowered.contains("two-factor") {
        StrategyError::TwoFactorRequired(message.to_string())
    } else if lowered.contains("login") || lowered.contains("log in") {
        StrategyError::LoginRequired {
            story: shape == UrlShape::Story,
            detail: message.to_string(),
        }
    } else if lowered.contains("format") {
        StrategyError::FormatUnsupported(message.to_string())
    } else {
        StrategyError::DownloadFailed {
            message: message.to_string(),
        }
    }
}

/// Extraction strategy delegating to the yt-dlp executable
pub struct YtdlpStrategy {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    scratch_root: PathBuf,
    cookie_candidates: Vec<PathBuf>,
    login: Option<(String, String)>,
    timeout: Duration,
}

impl YtdlpStrategy {
    /// Strategy running the real yt-dlp process
    #[must_use]
    pub fn new(settings: &FetchSettings) -> Self {
        Self::with_runner(settings, Arc::new(ProcessRunner))
    }

    /// Strategy with a custom command runner
    #[must_use]
    pub fn with_runner(settings: &FetchSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: settings.ytdlp_binary.clone(),
            scratch_root: settings.scratch_dir.clone(),
            cookie_candidates: settings.cookie_candidates(),
            login: settings
                .login_credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
            timeout: settings.download_timeout(),
        }
    }

    async fn resolve_credentials(&self) -> Credentials {
        for candidate in &self.cookie_candidates {
            let report = match inspect_cookie_file(candidate).await {
                Ok(report) => report,
                Err(CookieError::NotFound(_)) => continue,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable cookie file");
                    continue;
                }
            };
            if report.is_usable() {
                info!(path = %candidate.display(), cookies = report.cookies.len(), "Using cookies file");
                return Credentials::CookieFile(candidate.clone());
            }
            warn!(
                path = %candidate.display(),
                issues = report.issues.len(),
                cookies = report.cookies.len(),
                "Cookie file is malformed, skipping"
            );
        }

        match &self.login {
            Some((username, password)) => Credentials::Login {
                username: username.clone(),
                password: password.clone(),
            },
            None => Credentials::Anonymous,
        }
    }

    fn build_args(url: &str, format: &str, auth: &[String], scratch: &Path) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--playlist-items".to_string(),
            "1".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-f".to_string(),
            format.to_string(),
            "-o".to_string(),
            scratch.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
        ];
        args.extend_from_slice(auth);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Locate the produced file: reported name first, then a scan of the scratch dir
    async fn locate_file(info: &YtdlpInfo, scratch: &ScratchDir) -> Option<PathBuf> {
        for path in info.reported_paths() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        let found = scratch.find_media_file().await;
        if let Some(path) = &found {
            debug!(path = %path.display(), "Reported filename missing, found file by scan");
        }
        found
    }

    #[instrument(skip(self, auth, scratch))]
    async fn attempt(
        &self,
        url: &str,
        shape: UrlShape,
        format: &str,
        auth: &[String],
        scratch: &ScratchDir,
    ) -> Result<RawPayload, StrategyError> {
        let args = Self::build_args(url, format, auth, scratch.path());
        let output = self.runner.run(&self.binary, args, self.timeout).await?;

        if !output.success() {
            return Err(classify_error(output.error_text(), shape));
        }

        let info = YtdlpInfo::parse(&output.stdout).unwrap_or_else(|| {
            warn!("yt-dlp printed no metadata, relying on scratch directory scan");
            YtdlpInfo::default()
        });

        let path = Self::locate_file(&info, scratch).await.ok_or_else(|| {
            StrategyError::DownloadFailed {
                message: "yt-dlp finished but produced no media file".to_string(),
            }
        })?;

        let content = Bytes::from(tokio::fs::read(&path).await?);
        let extension = extension_of(&path);
        let is_video = extension
            .as_deref()
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext));
        let is_image = extension
            .as_deref()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext));

        debug!(
            path = %path.display(),
            bytes = content.len(),
            is_video,
            is_image,
            "Read downloaded file"
        );

        Ok(RawPayload {
            content,
            url: YtdlpInfo::non_empty(info.webpage_url).unwrap_or_else(|| url.to_string()),
            caption: YtdlpInfo::non_empty(info.description),
            title: Some(YtdlpInfo::non_empty(info.title).unwrap_or_else(|| FALLBACK_TITLE.to_string())),
            author: YtdlpInfo::non_empty(info.uploader).or_else(|| YtdlpInfo::non_empty(info.channel)),
            is_video,
            is_image,
            extension,
        })
    }
}

#[async_trait]
impl ExtractionStrategy for YtdlpStrategy {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    async fn download(&self, url: &str) -> Result<RawPayload, StrategyError> {
        let shape = UrlShape::classify(url);
        let credentials = self.resolve_credentials().await;
        debug!(?credentials, ?shape, "Starting yt-dlp download");

        // Dropping `scratch` on an early return or cancellation removes it
        let scratch = ScratchDir::create(&self.scratch_root).await?;
        let auth = credentials.to_args(&scratch).await?;

        let result = match self
            .attempt(url, shape, shape.format_preference(), &auth, &scratch)
            .await
        {
            Err(StrategyError::FormatUnsupported(original)) => {
                info!("Format unavailable, retrying with simpler format");
                self.attempt(url, shape, DEGRADED_FORMAT, &auth, &scratch)
                    .await
                    .map_err(|retry_err| {
                        debug!(error = %retry_err, "Retry with simpler format failed");
                        StrategyError::DownloadFailed { message: original }
                    })
            }
            other => other,
        };

        scratch.remove().await;
        result
    }
}
