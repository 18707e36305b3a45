//! Alignment vocabulary.

/// The nine alignments, in the order the randomizer draws from.
pub const ALIGNMENTS: [&str; 9] = [
    "Lawful Good",
    "Neutral Good",
    "Chaotic Good",
    "Lawful Neutral",
    "Neutral",
    "Chaotic Neutral",
    "Lawful Evil",
    "Neutral Evil",
    "Chaotic Evil",
];

/// Returns true if `name` is one of the nine alignments.
pub fn is_alignment(name: &str) -> bool {
    ALIGNMENTS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_alignments() {
        assert!(is_alignment("Neutral"));
        assert!(is_alignment("Chaotic Evil"));
        assert!(!is_alignment("Good"));
    }
}
