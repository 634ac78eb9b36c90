//! Parsed replies to AT commands.

use std::fmt;

use crate::result::ResultCode;

/// The default reply line terminator.
pub const DEFAULT_NEWLINE: &str = "\r\n";

/// A complete reply: the command that produced it, the generic output text and
/// the terminal result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The command this replies to, used for echo filtering and display.
    command: Option<String>,
    /// The parsed status line.
    result: ResultCode,
    /// Everything before the status line, echo and framing removed.
    output: String,
    /// `output` as received, before text decoding.
    raw: Vec<u8>,
    /// Terminator used to split `output` into lines.
    newline: String,
}

impl Response {
    /// Create a response directly.
    pub fn new(result: ResultCode, command: Option<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Response {
            command,
            result,
            raw: output.as_bytes().to_vec(),
            output,
            newline: DEFAULT_NEWLINE.to_string(),
        }
    }

    /// Try to parse accumulated reply text.
    ///
    /// The status line is whatever follows the last terminator once a single
    /// trailing terminator has been dropped. Returns `None` while that line is
    /// not a status line, which is how the matcher knows to keep reading. Text
    /// with no terminator ahead of its last line is never a complete reply.
    ///
    /// If `command` is given and appears in the output, it and everything
    /// before it are removed along with the whitespace that follows.
    pub fn parse(text: &str, command: Option<&str>, newline: &str) -> Option<Self> {
        Self::parse_bytes(text.as_bytes(), command, newline)
    }

    /// [`parse`](Self::parse) over raw bytes. The output may hold binary
    /// payload; only the status line has to be text.
    pub fn parse_bytes(data: &[u8], command: Option<&str>, newline: &str) -> Option<Self> {
        let terminator = newline.as_bytes();
        if terminator.is_empty() {
            return None;
        }

        let data = data.strip_suffix(terminator).unwrap_or(data);
        let pos = rfind(data, terminator)?;
        let (output, status) = (&data[..pos], &data[pos + terminator.len()..]);

        let result = ResultCode::parse(std::str::from_utf8(status).ok()?)?;

        let mut output = output;
        if let Some(command) = command.filter(|c| !c.is_empty()) {
            if let Some(pos) = find(output, command.as_bytes()) {
                output = &output[pos + command.len()..];
                let skip = output.iter().take_while(|b| b.is_ascii_whitespace()).count();
                output = &output[skip..];
            }
        }

        let skip = output.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
        let output = &output[skip..];
        let output = output.strip_suffix(terminator).unwrap_or(output);

        Some(Response {
            command: command.map(str::to_string),
            result,
            output: String::from_utf8_lossy(output).into_owned(),
            raw: output.to_vec(),
            newline: newline.to_string(),
        })
    }

    /// The command this replies to, if known.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// The terminal result.
    pub fn result(&self) -> ResultCode {
        self.result
    }

    /// The generic output preceding the status line.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// The output exactly as received.
    pub fn output_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Whether the command succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The output split on the reply terminator.
    ///
    /// Empty output yields no lines.
    pub fn lines(&self) -> Vec<&str> {
        if self.output.is_empty() {
            return Vec::new();
        }
        self.output.split(self.newline.as_str()).collect()
    }

    /// Whether the output contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(command) = self.command.as_deref().filter(|c| !c.is_empty()) {
            write!(f, "{}{}", command, self.newline)?;
        }
        if !self.output.is_empty() {
            write!(f, "{}{}", self.output, self.newline)?;
        }
        write!(f, "{}", self.result)
    }
}
