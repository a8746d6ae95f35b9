//! Invite codes: 6 random bytes, hex encoded.

use rand::RngCore;

/// Length of an invite code in characters.
pub const INVITE_CODE_LEN: usize = 12;

#[must_use]
pub fn generate_invite_code() -> String {
    let mut bytes = [0u8; INVITE_CODE_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_codes_differ() {
        let codes: HashSet<String> = (0..64).map(|_| generate_invite_code()).collect();
        assert!(codes.len() > 60);
    }
}
