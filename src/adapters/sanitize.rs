//! Log sanitization for patient data.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`], which redacts:
//! - Patient identifiers (UUIDs, MRNs)
//! - Email addresses
//! - Clinical attribute values written as `field=value` or `"field": value`
//!
//! Call sites should already avoid logging raw clinical values; this is the
//! fallback when one slips through (for example inside an error message).
//!
//! Input is capped at `HEARTRISK_SANITIZE_MAX_BYTES` (default 16 KiB) per
//! line.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

/// Clinical attribute names as they appear in records and artifacts.
const CLINICAL_FIELDS: &str =
    "age|sex|cp|trestbps|chol|fbs|restecg|thalach|exang|oldpeak|slope|ca|thal";

struct Patterns {
    set: RegexSet,
    rules: Vec<(Regex, String)>,
}

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let clinical = format!(
            r#"(?i)(["']?\b(?:{CLINICAL_FIELDS})\b["']?\s*[:=]\s*)("[^"]*"|'[^']*'|[^\s,;}}\]]+)"#
        );
        let rules: Vec<(String, String)> = vec![
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
                    .into(),
                "[REDACTED-ID]".into(),
            ),
            (r"\bMRN[:\s]?\d{6,10}\b".into(), "[REDACTED-MRN]".into()),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b"
                    .into(),
                "[REDACTED-EMAIL]".into(),
            ),
            (clinical, "${1}[REDACTED]".into()),
        ];

        let set = RegexSet::new(rules.iter().map(|(p, _)| p)).expect("Valid regex set");
        let rules = rules
            .into_iter()
            .map(|(p, r)| (Regex::new(&p).expect("Valid regex"), r))
            .collect();
        Patterns { set, rules }
    })
}

fn max_sanitize_bytes() -> usize {
    std::env::var("HEARTRISK_SANITIZE_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
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

/// Redact patient data from a string.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, max_sanitize_bytes())
}

fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let patterns = patterns();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    for idx in patterns.set.matches(prefix).into_iter() {
        let (regex, replacement) = &patterns.rules[idx];
        result = regex.replace_all(&result, replacement.as_str()).into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Check if a string contains redactable patient data.
#[must_use]
pub fn contains_patient_data(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, max_sanitize_bytes());
    patterns().set.is_match(prefix)
}

/// A `tracing_subscriber` writer wrapper that sanitizes each formatted log
/// line before it reaches the underlying sink.
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

pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.inner
                .write_all(sanitize(&String::from_utf8_lossy(&line)).as_bytes())?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A formatter writing one huge line with no newline must not buffer forever.
        if self.buffer.len() > max_sanitize_bytes().saturating_mul(2) {
            let line = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(line.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.buffer.clear();
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let rest = sanitize(&String::from_utf8_lossy(&self.buffer));
            self.inner.write_all(rest.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }
}

// Lines shorter than a newline still reach the sink when the writer is dropped.
impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
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
