/// Continuation-joining line reader: folds backslash-continued physical
/// lines from the captured backup log into logical lines.
use std::io::BufRead;

/// Iterator over logical lines of a raw log stream.
///
/// Each physical line is trimmed of surrounding whitespace and appended to
/// an accumulator. A single trailing backslash marks a continuation: the
/// marker is stripped and the next physical line is appended. Anything
/// else ends the logical line.
///
/// Blank logical lines are yielded as empty strings; filtering them is the
/// consumer's job. A stream that ends while a continuation is pending
/// drops the partial line without yielding it.
pub struct LogicalLines<R> {
    reader: R,
}

impl<R: BufRead> LogicalLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for LogicalLines<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut logical = String::new();
        let mut raw = String::new();
        loop {
            raw.clear();
            match self.reader.read_line(&mut raw) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            logical.push_str(raw.trim());
            if logical.ends_with('\\') {
                logical.pop();
                continue;
            }
            return Some(Ok(logical));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn logical(input: &str) -> Vec<String> {
        LogicalLines::new(Cursor::new(input))
            .map(|l| l.unwrap())
            .collect()
    }

    #[test]
    fn test_plain_lines_pass_through() {
        assert_eq!(logical("one\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        assert_eq!(logical("  padded line \t\n"), vec!["padded line"]);
    }

    #[test]
    fn test_last_line_without_newline() {
        assert_eq!(logical("one\ntwo"), vec!["one", "two"]);
    }

    #[test]
    fn test_continuation_joins_two_physical_lines() {
        assert_eq!(
            logical("backup started at \\\n2024-01-02 03:00:00\n"),
            vec!["backup started at 2024-01-02 03:00:00"]
        );
    }

    #[test]
    fn test_continuation_joins_many_physical_lines() {
        assert_eq!(logical("a\\\nb\\\nc\\\nd\n"), vec!["abcd"]);
    }

    #[test]
    fn test_split_line_matches_unsplit_line() {
        let unsplit = logical("prefix middle suffix\n");
        let split = logical("prefix middle \\\nsuffix\n");
        assert_eq!(unsplit, split);
    }

    #[test]
    fn test_blank_logical_lines_are_yielded() {
        assert_eq!(logical("one\n\ntwo\n"), vec!["one", "", "two"]);
    }

    #[test]
    fn test_only_trailing_marker_continues() {
        // A backslash in the middle of a line is ordinary content.
        assert_eq!(logical("path\\to\\file\n"), vec!["path\\to\\file"]);
    }

    #[test]
    fn test_eof_mid_continuation_drops_partial_line() {
        assert_eq!(logical("complete\npartial \\\n"), vec!["complete"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert_eq!(logical(""), Vec::<String>::new());
    }

    #[test]
    fn test_crlf_terminators_are_trimmed() {
        assert_eq!(logical("one\r\ntwo\r\n"), vec!["one", "two"]);
    }
}
