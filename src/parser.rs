/// One parsed input line: pipe-separated stages plus the background flag.
///
/// Stages still contain their redirection operators; the executor strips
/// them right before spawning.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Vec<String>>,
    pub background: bool,
    /// The submitted line with any trailing `&` removed, kept for `jobs`.
    pub text: String,
}

impl Pipeline {
    /// The single stage's words when this line is a plain command.
    pub fn as_simple(&self) -> Option<&[String]> {
        match self.stages.as_slice() {
            [only] => Some(only.as_slice()),
            _ => None,
        }
    }
}

/// Split a line into words on whitespace. There is no quoting or escaping,
/// so a word can never contain a space.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

/// Split a line into raw stage strings on every literal `|`.
pub fn split_stages(line: &str) -> Vec<&str> {
    line.split('|').collect()
}

/// Parse an input line into a [`Pipeline`].
///
/// A trailing `&` (with or without a space before it) marks the line for
/// background execution and is removed before splitting. Returns `None`
/// for a blank line.
pub fn parse_line(input: &str) -> Option<Pipeline> {
    let mut line = input.trim();
    if line.is_empty() {
        return None;
    }

    let background = match line.strip_suffix('&') {
        Some(rest) => {
            line = rest.trim_end();
            true
        }
        None => false,
    };

    if line.is_empty() {
        return None;
    }

    let stages = split_stages(line).into_iter().map(tokenize).collect();

    Some(Pipeline {
        stages,
        background,
        text: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  ls   -la\t/tmp "), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn quotes_are_not_special() {
        assert_eq!(tokenize(r#"echo "a b""#), vec!["echo", "\"a", "b\""]);
    }

    #[test]
    fn blank_line_is_none() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line(" & ").is_none());
    }

    #[test]
    fn simple_command() {
        let p = parse_line("echo hello world").unwrap();
        assert!(!p.background);
        assert_eq!(p.as_simple().unwrap(), ["echo", "hello", "world"]);
        assert_eq!(p.text, "echo hello world");
    }

    #[test]
    fn pipeline_stages() {
        let p = parse_line("ls -l | grep foo | wc -l").unwrap();
        assert_eq!(p.stages.len(), 3);
        assert_eq!(p.stages[1], vec!["grep", "foo"]);
        assert!(p.as_simple().is_none());
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let p = parse_line("sleep 5 &").unwrap();
        assert!(p.background);
        assert_eq!(p.text, "sleep 5");
        assert_eq!(p.stages, vec![vec!["sleep", "5"]]);

        let attached = parse_line("sleep 5&").unwrap();
        assert!(attached.background);
        assert_eq!(attached.stages, vec![vec!["sleep", "5"]]);
    }

    #[test]
    fn pipe_count_gives_stage_count() {
        let p = parse_line("a | b | c | d").unwrap();
        assert_eq!(p.stages.len(), 4);
    }

    #[test]
    fn empty_stage_is_kept_for_the_executor_to_reject() {
        let p = parse_line("ls || wc").unwrap();
        assert_eq!(p.stages.len(), 3);
        assert!(p.stages[1].is_empty());
    }

    #[test]
    fn pipe_inside_word_still_splits() {
        let p = parse_line("echo a|b").unwrap();
        assert_eq!(p.stages, vec![vec!["echo", "a"], vec!["b"]]);
    }
}
