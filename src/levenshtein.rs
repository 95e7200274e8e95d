//! Levenshtein edit distance.

/// Minimum number of single-character insertions, deletions or substitutions
/// needed to turn `a` into `b`. Characters are Unicode scalar values.
///
/// Runs in O(len(a) * len(b)) time and keeps two rows sized to the shorter
/// input.
pub fn distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // Rows run over the shorter string.
    let (long, short) = if a_chars.len() >= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(lc != sc);
            curr[j + 1] = (prev[j + 1] + 1) // deletion
                .min(curr[j] + 1) // insertion
                .min(prev[j] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Replace the character at `index` with one that never occurs in the
    /// test strings.
    pub(crate) fn mutate(s: &str, index: usize) -> String {
        s.chars()
            .enumerate()
            .map(|(i, c)| if i == index { '#' } else { c })
            .collect()
    }

    fn assert_distance(first: &str, second: &str, expected: usize) {
        assert_eq!(distance(first, second), expected, "{first:?} -> {second:?}");
        assert_eq!(distance(second, first), expected, "{second:?} -> {first:?}");
    }

    #[test]
    fn test_equal_strings() {
        assert_distance("Hello world.", "Hello world.", 0);
    }

    #[test]
    fn test_empty_strings() {
        assert_distance("", "", 0);
        assert_distance("", "Hello", 5);
        assert_distance("Grüße", "", 5);
    }

    #[test]
    fn test_every_mutation_increases_distance() {
        let start = "Hello there";
        let mut current = start.to_string();
        for expected in 0..start.chars().count() {
            assert_distance(start, &current, expected);
            current = mutate(&current, expected);
        }
    }

    #[test]
    fn test_every_deletion_increases_distance() {
        let start = "Hello there";
        let mut current = start.to_string();
        for expected in 0..start.len() {
            assert_distance(start, &current, expected);
            current.pop();
        }
    }

    #[test]
    fn test_every_addition_increases_distance() {
        let target = "NETFLIX.COM 4711";
        let mut current = String::new();
        for (expected, c) in target.chars().enumerate() {
            assert_distance("", &current, expected);
            current.push(c);
        }
    }

    #[test]
    fn test_classic_examples() {
        assert_distance("kitten", "sitting", 3);
        assert_distance("flaw", "lawn", 2);
        assert_distance("ab", "ba", 2);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_distance("Känguru", "Kanguru", 1);
    }
}
