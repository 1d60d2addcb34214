use crate::builtins::BUILTINS;

/// Largest edit distance still offered as a suggestion.
const MAX_DISTANCE: usize = 2;

/// Classic Levenshtein distance over chars, unit cost per insert, delete or
/// substitute.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != cb);
            row[j + 1] = substitute.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}

/// The candidate closest to `name`, if it is within two edits. Ties go to
/// the earliest candidate.
pub fn closest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for &candidate in candidates {
        let distance = edit_distance(name, candidate);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.filter(|&(_, d)| d <= MAX_DISTANCE).map(|(c, _)| c)
}

/// Nearest built-in name for a command that could not be found.
pub fn suggest(name: &str) -> Option<&'static str> {
    closest(name, BUILTINS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("help", "help"), 0);
    }

    #[test]
    fn transposition_costs_two() {
        assert_eq!(edit_distance("ecoh", "echo"), 2);
        assert_eq!(edit_distance("hlep", "help"), 2);
    }

    #[test]
    fn distance_counts_chars_not_bytes() {
        assert_eq!(edit_distance("héllo", "hello"), 1);
    }

    #[test]
    fn closest_within_threshold() {
        assert_eq!(closest("ecoh", &["echo", "cd"]), Some("echo"));
    }

    #[test]
    fn nothing_beyond_threshold() {
        assert_eq!(closest("zzzzzzzz", &["echo", "cd"]), None);
        assert_eq!(closest("anything", &[]), None);
    }

    #[test]
    fn suggests_builtins() {
        assert_eq!(suggest("hlep"), Some("help"));
        assert_eq!(suggest("jbos"), Some("jobs"));
        assert_eq!(suggest("exti"), Some("exit"));
        assert_eq!(suggest("zzzzzzzz"), None);
    }

    #[test]
    fn ties_prefer_earlier_candidate() {
        assert_eq!(closest("xg", &["fg", "bg"]), Some("fg"));
    }
}
