// Stream id hashing.
//
// Purpose
// - Turn arbitrary-length stream ids into fixed-width storage keys.
//
// Responsibilities
// - Sha1StreamIdHasher: deterministic, content-addressed digest (40 uppercase hex chars).
// - ValidatingStreamIdHasher: wraps any hasher, rejects blank ids and digests wider than the
//   storage column.

use crate::core::ports::{StoreError, StreamIdHasher};
use sha1::{Digest, Sha1};

/// Width of the hashed stream id column.
pub const MAX_STREAM_ID_HASH_LENGTH: usize = 40;

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1StreamIdHasher;

impl StreamIdHasher for Sha1StreamIdHasher {
    fn hash(&self, stream_id: &str) -> Result<String, StoreError> {
        let mut hasher = Sha1::new();
        hasher.update(stream_id.as_bytes());
        Ok(hex::encode_upper(hasher.finalize()))
    }
}

pub struct ValidatingStreamIdHasher<H> {
    inner: H,
    max_length: usize,
}

impl<H: StreamIdHasher> ValidatingStreamIdHasher<H> {
    pub fn new(inner: H) -> Self {
        Self::with_max_length(inner, MAX_STREAM_ID_HASH_LENGTH)
    }

    pub fn with_max_length(inner: H, max_length: usize) -> Self {
        Self { inner, max_length }
    }
}

impl<H: StreamIdHasher> StreamIdHasher for ValidatingStreamIdHasher<H> {
    fn hash(&self, stream_id: &str) -> Result<String, StoreError> {
        if stream_id.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "stream id is empty or whitespace".into(),
            ));
        }

        let hash = self.inner.hash(stream_id)?;
        if hash.trim().is_empty() {
            return Err(StoreError::InvalidStreamIdHash(format!(
                "hash of stream {stream_id} is empty or whitespace"
            )));
        }
        if hash.len() > self.max_length {
            return Err(StoreError::InvalidStreamIdHash(format!(
                "hash {hash} of stream {stream_id} is {} characters long, the maximum is {}",
                hash.len(),
                self.max_length
            )));
        }
        Ok(hash)
    }
}

/// SHA-1 digests checked against the default column width.
pub type DefaultStreamIdHasher = ValidatingStreamIdHasher<Sha1StreamIdHasher>;

impl Default for DefaultStreamIdHasher {
    fn default() -> Self {
        Self::new(Sha1StreamIdHasher)
    }
}

#[cfg(test)]
mod stream_id_hasher_tests {
    use super::*;
    use rstest::rstest;

    struct VerbatimHasher;

    impl StreamIdHasher for VerbatimHasher {
        fn hash(&self, stream_id: &str) -> Result<String, StoreError> {
            Ok(stream_id.to_string())
        }
    }

    #[rstest]
    fn it_should_produce_the_sha1_digest_in_uppercase_hex() {
        assert_eq!(
            Sha1StreamIdHasher.hash("abc").unwrap(),
            "A9993E364706816ABA3E25717850C26C9CD0D89D"
        );
    }

    #[rstest]
    fn it_should_be_deterministic_and_fixed_width() {
        let hasher = ValidatingStreamIdHasher::default();
        let long_id = "order-".repeat(500);
        let first = hasher.hash(&long_id).unwrap();
        let second = hasher.hash(&long_id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), MAX_STREAM_ID_HASH_LENGTH);
        assert_ne!(first, hasher.hash("order-2").unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn it_should_reject_blank_stream_ids(#[case] stream_id: &str) {
        let result = ValidatingStreamIdHasher::default().hash(stream_id);
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[rstest]
    fn it_should_fail_fast_when_the_digest_exceeds_the_column_width() {
        let hasher = ValidatingStreamIdHasher::new(VerbatimHasher);
        let too_long = "x".repeat(MAX_STREAM_ID_HASH_LENGTH + 1);
        let result = hasher.hash(&too_long);
        assert!(matches!(result, Err(StoreError::InvalidStreamIdHash(_))));
        assert!(hasher.hash("short").is_ok());
    }

    #[rstest]
    fn it_should_honour_a_narrower_configured_width() {
        let hasher = ValidatingStreamIdHasher::with_max_length(Sha1StreamIdHasher, 16);
        let result = hasher.hash("order-1");
        assert!(matches!(result, Err(StoreError::InvalidStreamIdHash(_))));
    }
}
