// src/share/classifier.rs

//! Heuristic readiness probe over a process's stdout.
//!
//! Lines are checked in order and the first decisive line wins:
//!
//! 1. a line containing any success token (by default `http://` or
//!    `https://`) means the share is up;
//! 2. otherwise a line containing any failure token, case-insensitively
//!    (by default `error` or `failed`), means it is not.
//!
//! Reaching end of input without a decisive line is a failure. Reading stops
//! at the deciding line; the process itself keeps running.
//!
//! A line such as `recovered after previous error, now serving on https://..`
//! is a success because the success rule is checked first, but
//! `previous error; retrying` followed later by a URL is a failure.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

use crate::exec::OutputStream;

/// Verdict text used when the stream closed before printing anything.
pub const NO_OUTPUT_MESSAGE: &str = "No output received from share command";

/// Default cap on captured output, in bytes.
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

/// Tokens that decide a line's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    success_tokens: Vec<String>,
    /// Stored lowercased.
    failure_tokens: Vec<String>,
}

impl ClassifierRules {
    pub fn new<S, F>(success_tokens: S, failure_tokens: F) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            success_tokens: success_tokens.into_iter().map(Into::into).collect(),
            failure_tokens: failure_tokens
                .into_iter()
                .map(|t| t.into().to_lowercase())
                .collect(),
        }
    }

    pub fn success_tokens(&self) -> &[String] {
        &self.success_tokens
    }

    pub fn failure_tokens(&self) -> &[String] {
        &self.failure_tokens
    }

    /// Classify a single line in isolation.
    pub fn verdict_for(&self, line: &str) -> LineVerdict {
        if self.success_tokens.iter().any(|t| line.contains(t.as_str())) {
            return LineVerdict::Success;
        }

        let lower = line.to_lowercase();
        if self.failure_tokens.iter().any(|t| lower.contains(t.as_str())) {
            return LineVerdict::Failure;
        }

        LineVerdict::Undecided
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::new(["http://", "https://"], ["error", "failed"])
    }
}

/// Verdict for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    Undecided,
    Success,
    Failure,
}

/// Result of classifying a stream. Carries the captured output once decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Pending,
    Success(String),
    Failure(String),
}

impl Classification {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Classification::Pending)
    }
}

/// Output captured while classifying, bounded to `limit` bytes.
///
/// When full, the oldest lines are dropped first, so the most recent (and
/// deciding) line is always retained. A single line longer than the limit
/// is cut at the limit.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    lines: VecDeque<String>,
    bytes: usize,
    limit: usize,
    dropped: usize,
}

impl CapturedOutput {
    pub fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit: limit.max(1),
            dropped: 0,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        let line = truncate_at_char_boundary(line, self.limit.saturating_sub(1));
        let cost = line.len() + 1;

        while self.bytes + cost > self.limit {
            match self.lines.pop_front() {
                Some(old) => {
                    self.bytes -= old.len() + 1;
                    self.dropped += 1;
                }
                None => break,
            }
        }

        self.bytes += cost;
        self.lines.push_back(line.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of lines evicted to stay within the limit.
    pub fn dropped_lines(&self) -> usize {
        self.dropped
    }

    /// Render as newline-terminated text, noting any evicted lines first.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.bytes + 48);
        if self.dropped > 0 {
            out.push_str(&format!("[{} earlier lines omitted]\n", self.dropped));
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Incremental classifier: feed lines, get a verdict.
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    rules: ClassifierRules,
    captured: CapturedOutput,
    verdict: Classification,
}

impl OutputClassifier {
    pub fn new(rules: ClassifierRules, capture_limit: usize) -> Self {
        Self {
            rules,
            captured: CapturedOutput::new(capture_limit),
            verdict: Classification::Pending,
        }
    }

    /// Feed one line. Lines after the verdict is decided are ignored.
    pub fn observe_line(&mut self, line: &str) -> &Classification {
        if self.verdict.is_decided() {
            return &self.verdict;
        }

        self.captured.push_line(line);

        self.verdict = match self.rules.verdict_for(line) {
            LineVerdict::Success => Classification::Success(self.captured.text()),
            LineVerdict::Failure => Classification::Failure(self.captured.text()),
            LineVerdict::Undecided => Classification::Pending,
        };

        &self.verdict
    }

    /// Close the stream: a still-pending verdict becomes a failure.
    pub fn finish(self) -> Classification {
        match self.verdict {
            Classification::Pending if self.captured.is_empty() => {
                Classification::Failure(NO_OUTPUT_MESSAGE.to_string())
            }
            Classification::Pending => Classification::Failure(self.captured.text()),
            decided => decided,
        }
    }

    /// Read `reader` line by line until a verdict is reached or it closes.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than ending the
    /// read. At most `capture_limit` bytes of any one line are buffered; the
    /// rest of an overlong line is skipped.
    pub async fn classify<R>(mut self, reader: R) -> Classification
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let max_line = self.captured.limit();
        let mut buf = Vec::new();

        loop {
            match read_capped_line(&mut reader, &mut buf, max_line).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_line_ending(&buf));
                    debug!("stdout: {}", line);
                    if self.observe_line(&line).is_decided() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stdout read failed; treating as end of output");
                    break;
                }
            }
        }

        if self.captured.dropped_lines() > 0 {
            debug!(
                dropped = self.captured.dropped_lines(),
                "captured output exceeded limit; oldest lines dropped"
            );
        }

        self.finish()
    }
}

/// Read one `\n`-terminated line into `buf`, keeping at most `max` bytes of
/// it. Returns the number of bytes consumed from `reader`, so `0` means end
/// of input.
async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut consumed = 0;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(consumed);
        }

        let (chunk_len, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        let keep = chunk_len.min(max.saturating_sub(buf.len()));
        buf.extend_from_slice(&available[..keep]);

        reader.consume(chunk_len);
        consumed += chunk_len;
        if done {
            return Ok(consumed);
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Run the classifier on its own task and deliver the verdict through a
/// oneshot channel.
///
/// Sending on a oneshot never blocks, so if the receiver has already been
/// dropped (the caller gave up waiting) the task still finishes as soon as
/// the stream closes.
pub fn spawn_classifier(
    name: &str,
    stream: OutputStream,
    rules: ClassifierRules,
    capture_limit: usize,
) -> oneshot::Receiver<Classification> {
    let (tx, rx) = oneshot::channel();
    let name = name.to_string();

    tokio::spawn(async move {
        let verdict = OutputClassifier::new(rules, capture_limit)
            .classify(stream)
            .await;

        if tx.send(verdict).is_err() {
            debug!(name = %name, "verdict arrived after startup was decided; discarded");
        }
        debug!(name = %name, "output classifier finished");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_lines(lines: &[&str]) -> Classification {
        let mut c = OutputClassifier::new(ClassifierRules::default(), DEFAULT_CAPTURE_LIMIT);
        for line in lines {
            if c.observe_line(line).is_decided() {
                break;
            }
        }
        c.finish()
    }

    #[test]
    fn url_line_is_success_with_all_prior_lines() {
        let v = classify_lines(&["Connecting...", "Server running at https://tunnel.example/abc123"]);
        assert_eq!(
            v,
            Classification::Success(
                "Connecting...\nServer running at https://tunnel.example/abc123\n".to_string()
            )
        );
    }

    #[test]
    fn plain_http_counts_as_success() {
        assert!(matches!(
            classify_lines(&["listening on http://127.0.0.1:8080"]),
            Classification::Success(_)
        ));
    }

    #[test]
    fn failure_tokens_are_case_insensitive() {
        for line in ["Error: port 9000 already in use", "bind FAILED", "an ERROR occurred"] {
            assert!(
                matches!(classify_lines(&[line]), Classification::Failure(_)),
                "{line} should be a failure"
            );
        }
    }

    #[test]
    fn success_token_wins_within_the_same_line() {
        let v = classify_lines(&["recovered after previous error, now serving on https://x.example"]);
        assert!(matches!(v, Classification::Success(_)));
    }

    #[test]
    fn first_decisive_line_wins() {
        let v = classify_lines(&["Starting up...", "Error: boom", "https://late.example"]);
        assert_eq!(
            v,
            Classification::Failure("Starting up...\nError: boom\n".to_string())
        );
    }

    #[test]
    fn end_of_input_without_output_is_failure() {
        assert_eq!(
            classify_lines(&[]),
            Classification::Failure(NO_OUTPUT_MESSAGE.to_string())
        );
    }

    #[test]
    fn end_of_input_with_output_reports_captured_text() {
        assert_eq!(
            classify_lines(&["Starting up...", "still starting"]),
            Classification::Failure("Starting up...\nstill starting\n".to_string())
        );
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let rules = ClassifierRules::new(["READY"], ["Panic"]);
        assert_eq!(rules.failure_tokens(), ["panic"]);
        assert_eq!(rules.verdict_for("service READY"), LineVerdict::Success);
        assert_eq!(rules.verdict_for("https://not-a-token-here"), LineVerdict::Undecided);
        assert_eq!(rules.verdict_for("PANIC: oh no"), LineVerdict::Failure);
    }

    #[test]
    fn captured_output_drops_oldest_lines_when_full() {
        let mut out = CapturedOutput::new(12);
        out.push_line("aaaa");
        out.push_line("bbbb");
        out.push_line("cccc");

        assert_eq!(out.dropped_lines(), 1);
        assert_eq!(out.text(), "[1 earlier lines omitted]\nbbbb\ncccc\n");
    }

    #[test]
    fn captured_output_truncates_oversized_line() {
        let mut out = CapturedOutput::new(6);
        out.push_line("ééééé");
        // 5 bytes available for the line; 'é' is 2 bytes.
        assert_eq!(out.text(), "éé\n");
    }

    #[tokio::test]
    async fn classify_reads_until_decisive_line() {
        let input: &[u8] = b"Connecting...\nServer running at https://tunnel.example/abc123\nnever read\n";
        let v = OutputClassifier::new(ClassifierRules::default(), DEFAULT_CAPTURE_LIMIT)
            .classify(input)
            .await;
        assert_eq!(
            v,
            Classification::Success(
                "Connecting...\nServer running at https://tunnel.example/abc123\n".to_string()
            )
        );
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_end_the_read() {
        let input: &[u8] = b"banner \xff\xfe\nServer running at https://tunnel.example/abc123\n";
        let v = OutputClassifier::new(ClassifierRules::default(), DEFAULT_CAPTURE_LIMIT)
            .classify(input)
            .await;
        assert_eq!(
            v,
            Classification::Success(
                "banner \u{FFFD}\u{FFFD}\nServer running at https://tunnel.example/abc123\n"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn crlf_line_endings_are_stripped() {
        let input: &[u8] = b"Connecting...\r\nError: nope\r\n";
        let v = OutputClassifier::new(ClassifierRules::default(), DEFAULT_CAPTURE_LIMIT)
            .classify(input)
            .await;
        assert_eq!(v, Classification::Failure("Connecting...\nError: nope\n".to_string()));
    }

    #[tokio::test]
    async fn overlong_line_is_capped_while_reading() {
        let mut input = vec![b'x'; 1024 * 1024];
        input.extend_from_slice(b"\nready at https://ok.example\n");

        let mut reader = BufReader::new(input.as_slice());
        let mut buf = Vec::new();

        let consumed = read_capped_line(&mut reader, &mut buf, 100).await.unwrap();
        assert_eq!(consumed, 1024 * 1024 + 1);
        assert_eq!(buf.len(), 100);

        read_capped_line(&mut reader, &mut buf, 100).await.unwrap();
        assert_eq!(buf, b"ready at https://ok.example\n");

        assert_eq!(read_capped_line(&mut reader, &mut buf, 100).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn output_without_newlines_stays_within_capture_limit() {
        use tokio::io::AsyncWriteExt;

        let (mut writer, reader) = tokio::io::duplex(4096);
        let task = tokio::spawn(async move {
            OutputClassifier::new(ClassifierRules::default(), 256)
                .classify(reader)
                .await
        });

        for _ in 0..64 {
            writer.write_all(&[b'z'; 4096]).await.unwrap();
        }
        writer.write_all(b"\nhttps://late.example\n").await.unwrap();
        drop(writer);

        match task.await.unwrap() {
            Classification::Success(text) => {
                assert!(text.len() <= 256 + 48, "captured {} bytes", text.len());
                assert!(text.ends_with("https://late.example\n"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawned_classifier_completes_when_receiver_is_gone() {
        let (writer, reader) = tokio::io::duplex(64);
        let rx = spawn_classifier(
            "demo",
            Box::pin(reader),
            ClassifierRules::default(),
            DEFAULT_CAPTURE_LIMIT,
        );
        drop(rx);
        // Closing the stream lets the abandoned task exit.
        drop(writer);
        tokio::task::yield_now().await;
    }
}
