//! Composite keys identifying outstanding requests.

use {
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    std::fmt,
};

/// Identifies one outstanding request for timeout tracking.
///
/// The key is a SHA-256 digest over the requester's identity, the
/// conversation id that scopes the sequence number, and the big-endian
/// sequence number itself. Register and cancel call sites derive the key
/// from the same triple, so a cancellation always matches its
/// registration, and sequence numbers only need to be unique within one
/// conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey(Hash);

impl RequestKey {
    /// Derive the key for (validator, conversation, sequence number).
    pub fn new(validator_id: &Pubkey, conversation_id: &Hash, request_seq: u32) -> Self {
        Self(solana_sha256_hasher::hashv(&[
            validator_id.as_ref(),
            conversation_id.as_ref(),
            &request_seq.to_be_bytes(),
        ]))
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_triple_same_key() {
        let validator = Pubkey::new_unique();
        let conversation = Hash::new_unique();
        assert_eq!(
            RequestKey::new(&validator, &conversation, 7),
            RequestKey::new(&validator, &conversation, 7)
        );
    }

    #[test]
    fn test_any_component_changes_key() {
        let validator = Pubkey::new_unique();
        let conversation = Hash::new_unique();
        let key = RequestKey::new(&validator, &conversation, 7);

        assert_ne!(key, RequestKey::new(&Pubkey::new_unique(), &conversation, 7));
        assert_ne!(key, RequestKey::new(&validator, &Hash::new_unique(), 7));
        assert_ne!(key, RequestKey::new(&validator, &conversation, 8));
    }

    #[test]
    fn test_key_is_not_the_raw_sequence() {
        // The digest must mix all three inputs; two requests that agree on
        // sequence number but differ elsewhere must not collide.
        let conversation = Hash::new_unique();
        let a = RequestKey::new(&Pubkey::new_unique(), &conversation, 0);
        let b = RequestKey::new(&Pubkey::new_unique(), &conversation, 0);
        assert_ne!(a, b);
    }
}
