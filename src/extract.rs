/// Single-pass extraction: drive logical lines through the event grammar
/// and fold each recognized event into the run state.
use crate::classify::{ClassifyError, EventKind, Ruleset, Variant};
use crate::lines::LogicalLines;
use crate::state::{RunFacts, RunState};
use std::io::BufRead;

/// Errors that can abort the extraction pass.
#[derive(Debug)]
pub enum ExtractError {
    /// Reading the input stream failed.
    Io(std::io::Error),
    /// A recognized line could not be classified (malformed timestamp).
    Classify(ClassifyError),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "failed to read log stream: {e}"),
            ExtractError::Classify(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Io(e) => Some(e),
            ExtractError::Classify(e) => Some(e),
        }
    }
}

impl From<ClassifyError> for ExtractError {
    fn from(e: ClassifyError) -> Self {
        ExtractError::Classify(e)
    }
}

/// Read the whole stream and reduce it to the run's fact set.
///
/// Blank logical lines are skipped; unrecognized lines are ignored. The
/// stream is always consumed to exhaustion, so facts for events that
/// never occurred stay at their zero defaults.
pub fn extract_facts<R: BufRead>(input: R, variant: Variant) -> Result<RunFacts, ExtractError> {
    let ruleset = Ruleset::for_variant(variant);
    let mut state = RunState::new(variant);

    for line in LogicalLines::new(input) {
        let line = line.map_err(ExtractError::Io)?;
        if line.is_empty() {
            continue;
        }
        let event = match ruleset.classify(&line)? {
            Some(event) => event,
            None => continue,
        };
        if event.kind == EventKind::Error {
            match variant {
                Variant::Simple => println!("ERROR"),
                Variant::Full => tracing::warn!(%line, "backup run reported an error"),
            }
        }
        state.observe(&event);
    }

    Ok(state.facts())
}
