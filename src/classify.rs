/// Event grammar for backup log lines: an ordered table of tagged regex
/// rules that classifies each logical line and extracts its timestamp.
use chrono::NaiveDateTime;
use regex::Regex;

/// Which log grammar the stream is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// Start/finish lines with embedded timestamps, no phase events.
    Simple,
    /// Full-backup logs with prepare and prune phase events.
    Full,
}

/// Classified category of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Prepare,
    End,
    Prune,
    Error,
}

/// One recognized event: the line's category and its embedded timestamp
/// as Unix epoch seconds. Error lines in the simple grammar carry no
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunEvent {
    pub kind: EventKind,
    pub timestamp: Option<i64>,
}

/// Errors produced while classifying a line.
#[derive(Debug)]
pub enum ClassifyError {
    /// A line matched an event pattern but its timestamp substring did
    /// not parse. The run cannot produce meaningful durations past this
    /// point, so this aborts before any metric is emitted.
    Timestamp {
        line: String,
        source: chrono::ParseError,
    },
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyError::Timestamp { line, source } => {
                write!(f, "unparseable timestamp in line {:?}: {}", line, source)
            }
        }
    }
}

impl std::error::Error for ClassifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassifyError::Timestamp { source, .. } => Some(source),
        }
    }
}

/// One rule of the table. Capture group 1, when the pattern has one, is
/// the timestamp substring.
struct EventRule {
    kind: EventKind,
    pattern: Regex,
}

/// Ordered, grammar-specific rule table.
///
/// Rules are tried top to bottom and classification stops at the first
/// match; the error rule sits first in both tables. The expected log
/// grammars make the patterns mutually exclusive, so ordering only
/// matters for lines outside the grammar.
pub struct Ruleset {
    rules: Vec<EventRule>,
    timestamp_format: &'static str,
}

const SIMPLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FULL_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

// Leading timestamp shared by every full-grammar pattern.
const FULL_TS: &str = r"^(\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}) ";

fn rule(kind: EventKind, pattern: &str) -> EventRule {
    EventRule {
        kind,
        pattern: Regex::new(pattern).expect("event pattern compiles"),
    }
}

impl Ruleset {
    /// Build the rule table for the given grammar, compiling its regexes
    /// once.
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Simple => Self {
                timestamp_format: SIMPLE_TIMESTAMP_FORMAT,
                rules: vec![
                    rule(EventKind::Error, r" ERROR: "),
                    rule(
                        EventKind::Start,
                        r"started at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})",
                    ),
                    rule(
                        EventKind::End,
                        r"finished at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})",
                    ),
                ],
            },
            Variant::Full => Self {
                timestamp_format: FULL_TIMESTAMP_FORMAT,
                rules: vec![
                    rule(EventKind::Error, &format!("{FULL_TS}ERROR:")),
                    rule(EventKind::Start, &format!("{FULL_TS}INFO: Running .*backup")),
                    rule(EventKind::Prepare, &format!("{FULL_TS}INFO: Preparing")),
                    rule(EventKind::End, &format!("{FULL_TS}INFO: Cleaning up")),
                    rule(EventKind::Prune, &format!("{FULL_TS}INFO: Pruning")),
                ],
            },
        }
    }

    /// Classify one non-blank logical line.
    ///
    /// Returns `Ok(None)` when no rule matches. A matching rule whose
    /// timestamp substring fails to parse is fatal for the run.
    pub fn classify(&self, line: &str) -> Result<Option<RunEvent>, ClassifyError> {
        for rule in &self.rules {
            let caps = match rule.pattern.captures(line) {
                Some(caps) => caps,
                None => continue,
            };
            let timestamp = match caps.get(1) {
                Some(m) => Some(self.parse_timestamp(m.as_str()).map_err(|e| {
                    ClassifyError::Timestamp {
                        line: line.to_string(),
                        source: e,
                    }
                })?),
                None => None,
            };
            return Ok(Some(RunEvent {
                kind: rule.kind,
                timestamp,
            }));
        }
        Ok(None)
    }

    /// Timestamps are taken as UTC wall-clock and converted to epoch
    /// seconds.
    fn parse_timestamp(&self, raw: &str) -> Result<i64, chrono::ParseError> {
        NaiveDateTime::parse_from_str(raw, self.timestamp_format)
            .map(|dt| dt.and_utc().timestamp())
    }
}
