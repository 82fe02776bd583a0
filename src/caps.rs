//! Capability constants and letter mappings

// Capability bit constants
pub const VIEW: u64 = 1;
pub const EDIT: u64 = 1 << 1;
pub const APPROVE: u64 = 1 << 2;
pub const MANAGE: u64 = 1 << 3;
pub const TRACK: u64 = 1 << 4;

/// Every capability bit
pub const ALL: u64 = VIEW | EDIT | APPROVE | MANAGE | TRACK;

// Claim letter mappings
const CAPS: &[(char, u64)] = &[
    ('V', VIEW),
    ('E', EDIT),
    ('A', APPROVE),
    ('M', MANAGE),
    ('T', TRACK),
];

/// Convert a capability mask to its claim letters
pub fn caps_to_letters(mask: u64) -> Vec<char> {
    CAPS.iter()
        .filter(|(_, b)| mask & b == *b)
        .map(|(c, _)| *c)
        .collect()
}

/// Convert claim letters to a mask. Unknown letters are ignored; matching is
/// case-insensitive.
pub fn letters_to_caps<'a>(letters: impl Iterator<Item = &'a str>) -> u64 {
    letters
        .filter_map(|s| {
            let c = s.trim().chars().next()?.to_ascii_uppercase();
            CAPS.iter().find(|(k, _)| *k == c).map(|(_, v)| *v)
        })
        .fold(0, |a, b| a | b)
}

/// The claim letter for a single capability bit, for error metadata
pub fn cap_letter(mask: u64) -> char {
    CAPS.iter()
        .find(|(_, b)| *b == mask)
        .map(|(c, _)| *c)
        .unwrap_or('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_round_trip() {
        let mask = letters_to_caps(["V", "A", "M"].into_iter());
        assert_eq!(mask, VIEW | APPROVE | MANAGE);
        assert_eq!(caps_to_letters(mask), vec!['V', 'A', 'M']);
    }

    #[test]
    fn parse_is_case_insensitive_and_lenient() {
        assert_eq!(letters_to_caps(["v", "t"].into_iter()), VIEW | TRACK);
        assert_eq!(letters_to_caps(["X", "?"].into_iter()), 0);
        assert_eq!(letters_to_caps([" e "].into_iter()), EDIT);
    }

    #[test]
    fn single_bit_letters() {
        assert_eq!(cap_letter(APPROVE), 'A');
        assert_eq!(cap_letter(TRACK), 'T');
        assert_eq!(cap_letter(VIEW | EDIT), '?');
    }
}
