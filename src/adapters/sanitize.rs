//! Log sanitization for patient data and key material.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`] before reaching
//! the sink. The filter redacts:
//! - Record identifiers (UUIDs) and national ID numbers
//! - Contact details (email, phone)
//! - Raw lab readings written as `name=value` or `name: value`
//! - Signing seeds, tokens and other key material
//!
//! Services are expected to log labels and scores only; this is the net for
//! anything that slips through.
//!
//! Input longer than `HEMOSCAN_SANITIZE_MAX_BYTES` (default 16 KiB) is
//! truncated before scanning.

use std::io::Write;
use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;
const MAX_BYTES_ENV: &str = "HEMOSCAN_SANITIZE_MAX_BYTES";

/// Pattern and replacement. Replacements may reference capture groups.
const RULES: &[(&str, &str)] = &[
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-ID]",
    ),
    // Aadhaar-style 12-digit national ID, optionally grouped by four.
    (r"\b\d{4}[ -]?\d{4}[ -]?\d{4}\b", "[REDACTED-NATIONAL-ID]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"(?:\+91[-\s]?)?\b[6-9]\d{4}[-\s]?\d{5}\b",
        "[REDACTED-PHONE]",
    ),
    (
        r"(?i)\b(hemoglobin|hb|hematocrit|hct|rbc_count|rbc|mcv|mchc|mch|iron_level|iron|ferritin|bmi|age)\s*[:=]\s*-?\d+(?:\.\d+)?",
        "$1=[REDACTED-LAB]",
    ),
    (
        r"(?i)\b(?:seed|signing[_-]?key|private[_-]?key|secret|token|password|key)\b\s*[:=]\s*[A-Za-z0-9+/]{32,}={0,2}",
        "[REDACTED-SECRET]",
    ),
    (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
];

struct Redactor {
    any: RegexSet,
    rules: Vec<(Regex, &'static str)>,
    pem: Regex,
}

fn redactor() -> &'static Redactor {
    static REDACTOR: OnceLock<Redactor> = OnceLock::new();
    REDACTOR.get_or_init(|| Redactor {
        any: RegexSet::new(RULES.iter().map(|(p, _)| *p)).expect("Valid regex set"),
        rules: RULES
            .iter()
            .map(|(p, r)| (Regex::new(p).expect("Valid regex"), *r))
            .collect(),
        pem: Regex::new(
            r"(?s)-----BEGIN [A-Z0-9 ]{0,40}PRIVATE KEY-----.{0,8192}?-----END [A-Z0-9 ]{0,40}PRIVATE KEY-----",
        )
        .expect("Valid regex"),
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var(MAX_BYTES_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_SANITIZE_MAX_BYTES)
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact sensitive values from a log line.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let redactor = redactor();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut out = prefix.to_string();
    for idx in redactor.any.matches(prefix).iter() {
        let (regex, replacement) = &redactor.rules[idx];
        out = regex.replace_all(&out, *replacement).into_owned();
    }
    if out.contains("-----BEGIN ") {
        out = redactor
            .pem
            .replace_all(&out, "[REDACTED-PEM-PRIVATE-KEY]")
            .into_owned();
    }

    if truncated {
        out.push_str(" [TRUNCATED]");
    }
    out
}

/// A `tracing_subscriber` writer factory that sanitizes each formatted line
/// before it is written to the wrapped sink.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let sanitized = sanitize(&String::from_utf8_lossy(bytes));
        self.inner.write_all(sanitized.as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter writing one huge line must not buffer without bound.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}
