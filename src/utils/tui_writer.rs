use std::io;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn parse(s: &str) -> Self {
        match s {
            "ERROR" => LogLevel::Error,
            "WARN" => LogLevel::Warn,
            "DEBUG" => LogLevel::Debug,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Routes tracing output into a channel the dashboard drains, so log lines
/// land in the TUI log strip instead of corrupting the alternate screen.
#[derive(Clone)]
pub struct TuiWriter {
    sender: mpsc::UnboundedSender<LogEntry>,
}

impl TuiWriter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (TuiWriter { sender }, receiver)
    }
}

impl io::Write for TuiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines() {
            if let Some(entry) = parse_fmt_line(line) {
                let _ = self.sender.send(entry);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for TuiWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Parse one line of tracing's default fmt output:
/// `2025-03-01T09:00:00.123456Z  INFO studysync::client: Session started`.
/// Lines that do not match are kept verbatim at info level.
fn parse_fmt_line(line: &str) -> Option<LogEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some((timestamp_str, rest)) = line.split_once(char::is_whitespace) else {
        return Some(LogEntry {
            level: LogLevel::Info,
            message: line.to_string(),
            timestamp: chrono::Utc::now(),
        });
    };

    let timestamp = match chrono::DateTime::parse_from_rfc3339(timestamp_str) {
        Ok(parsed) => parsed.with_timezone(&chrono::Utc),
        Err(_) => {
            return Some(LogEntry {
                level: LogLevel::Info,
                message: line.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    };

    let (level_str, message_part) = match rest.trim_start().split_once(char::is_whitespace) {
        Some((level, message)) => (level, message),
        None => {
            return Some(LogEntry {
                level: LogLevel::Info,
                message: rest.trim_start().to_string(),
                timestamp,
            });
        }
    };

    // Strip the `module::path:` prefix fmt puts in front of the message.
    let message = match message_part.trim_start().split_once(": ") {
        Some((target, msg)) if !target.contains(' ') => msg.to_string(),
        _ => message_part.trim_start().to_string(),
    };

    Some(LogEntry {
        level: LogLevel::parse(level_str.trim()),
        message,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fmt_line() {
        let line = "2025-03-01T09:00:00.123456Z  WARN studysync::client::http: Backend error 502: bad gateway";
        let entry = parse_fmt_line(line).unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.message, "Backend error 502: bad gateway");
    }

    #[test]
    fn keeps_unstructured_lines_verbatim() {
        let entry = parse_fmt_line("plain panic output").unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "plain panic output");
    }

    #[test]
    fn skips_blank_lines() {
        assert!(parse_fmt_line("   ").is_none());
    }
}
