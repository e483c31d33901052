use dotenvy::dotenv;
use reelfetch_core::config::FetchSettings;
use reelfetch_transport_telegram::config::{BotSettings, TelegramSettings};
use reelfetch_transport_telegram::runner::run_bot;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    password_env: Regex,
    password_arg: Regex,
    sessionid: Regex,
}

impl RedactionPatterns {
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"(bot)?[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
            password_env: Regex::new(r"(INSTAGRAM_PASSWORD|instagram_password)=[^\s&]+")?,
            password_arg: Regex::new(r#"(--password"?,?\s*"?)[^\s",\]]+"#)?,
            sessionid: Regex::new(r"(sessionid(?:\t|=|: ?))[^\s;,]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token_url.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token_bare.replace_all(&output, "[TELEGRAM_TOKEN]");
        let output = self.password_env.replace_all(&output, "$1=[MASKED]");
        let output = self.password_arg.replace_all(&output, "$1[MASKED]");
        let output = self.sessionid.replace_all(&output, "$1[MASKED]");
        output.into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length, the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compile redaction patterns before any log line is written
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Reelfetch TG Bot...");

    let settings = init_settings();
    if let Err(e) = tokio::fs::create_dir_all(&settings.fetch.scratch_dir).await {
        error!(
            error = %e,
            path = %settings.fetch.scratch_dir.display(),
            "Failed to create scratch directory"
        );
        std::process::exit(1);
    }

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "reelfetch_core=info,reelfetch_transport_telegram=info,reelfetch_telegram_bot=info,teloxide=warn,hyper=warn,reqwest=warn,tokio=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let fetch_settings = match FetchSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load fetch configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    if telegram_settings.telegram_token.is_empty() {
        error!("TELEGRAM_TOKEN (or TELEGRAM_BOT_TOKEN) is not set");
        std::process::exit(1);
    }

    match BotSettings::new(fetch_settings, telegram_settings) {
        Ok(settings) => {
            info!("Configuration loaded successfully.");
            Arc::new(settings)
        }
        Err(e) => {
            error!("Invalid telegram configuration: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> RedactionPatterns {
        RedactionPatterns::new().expect("patterns compile")
    }

    #[test]
    fn test_redacts_telegram_token() {
        let p = patterns();
        let token = format!("123456789:{}", "A".repeat(35));
        let line = format!("POST https://api.telegram.org/bot{token}/sendMessage");
        let out = p.redact(&line);
        assert!(!out.contains(&token));
        assert!(out.contains("[TELEGRAM_TOKEN]"));
    }

    #[test]
    fn test_redacts_instagram_password() {
        let p = patterns();
        assert_eq!(
            p.redact("INSTAGRAM_PASSWORD=hunter2 loaded"),
            "INSTAGRAM_PASSWORD=[MASKED] loaded"
        );
        let out = p.redact(r#"args=["--username", "alice", "--password", "hunter2", "--"]"#);
        assert!(!out.contains("hunter2"));
        assert!(out.contains("alice"));
    }

    #[test]
    fn test_redacts_sessionid() {
        let p = patterns();
        let out = p.redact(".instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\t1234%3Aabcd");
        assert!(!out.contains("1234%3Aabcd"));
        assert_eq!(p.redact("cookie: sessionid=xyz; path=/"), "cookie: sessionid=[MASKED]; path=/");
    }

    #[test]
    fn test_writer_reports_original_length() {
        let mut sink = Vec::new();
        let mut writer = RedactingWriter::new(&mut sink, Arc::new(patterns()));
        let n = writer
            .write(b"INSTAGRAM_PASSWORD=x")
            .expect("write succeeds");
        assert_eq!(n, 20);
        assert_eq!(String::from_utf8_lossy(&sink), "INSTAGRAM_PASSWORD=[MASKED]");
    }
}
