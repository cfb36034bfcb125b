use lazy_static::lazy_static;
use rand::{seq::SliceRandom, thread_rng};
use regex::Regex;

/// The alphabet room codes are drawn from. `0`, `O`, `1`, and `I` are
/// excluded because they are easy to confuse when read off a screen.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The length of a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

lazy_static! {
    pub static ref ROOM_CODE_REGEX: Regex =
        Regex::new(r"^[ABCDEFGHJKLMNPQRSTUVWXYZ23456789]{6}$").unwrap();
}

/// Generates a new random room code.
pub fn random_room_code() -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| *ROOM_CODE_ALPHABET.choose(&mut rng).expect("alphabet is not empty") as char)
        .take(ROOM_CODE_LENGTH)
        .collect()
}

/// Returns true if the given string has the shape of a room code.
pub fn is_room_code(code: &str) -> bool {
    ROOM_CODE_REGEX.is_match(code)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_codes_match_the_alphabet() {
        for _ in 0..64 {
            let code = random_room_code();

            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(is_room_code(&code), "{code} is not a valid room code");
        }
    }

    #[test]
    fn ambiguous_characters_are_rejected() {
        assert!(!is_room_code("ABC0EF"));
        assert!(!is_room_code("ABCOEF"));
        assert!(!is_room_code("ABC1EF"));
        assert!(!is_room_code("ABCIEF"));
        assert!(!is_room_code("abcdef"));
        assert!(!is_room_code("ABCDEFG"));
    }
}
