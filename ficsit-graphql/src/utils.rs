use serde::Serialize;
use std::{io, num::Wrapping};

const DJB2_SEED: u32 = 5381;

/// djb2 hash of a query document.
pub fn hash_query(query: &str) -> u32 {
    let mut h = Wrapping(DJB2_SEED);
    for byte in query.bytes() {
        h = (h << 5) + h + Wrapping(byte as u32);
    }
    h.0
}

struct Djb2Writer(Wrapping<u64>);

impl io::Write for Djb2Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for byte in buf {
            self.0 = (self.0 << 5) + self.0 + Wrapping(*byte as u64);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// When we have separate values it's useful to run a progressive
/// version of djb2 where we pretend that we're still looping over
/// the same value. The value is fed in as its JSON form.
pub fn progressive_hash<V: Serialize>(h: u32, x: &V) -> u64 {
    let mut writer = Djb2Writer(Wrapping(h as u64));
    if let Err(e) = serde_json::to_writer(&mut writer, x) {
        tracing::warn!(error = %e, "variables could not be serialized for hashing");
    }
    writer.0 .0
}

/// SHA-256 of a query document as lowercase hex, the form used by the `persistedQuery` extension.
#[cfg(feature = "default-exchanges")]
pub fn sha256_hex(query: &str) -> String {
    use sha2::{Digest, Sha256};

    let digest = <Sha256 as Digest>::digest(query.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_hash_is_stable() {
        assert_eq!(hash_query(""), 5381);
        assert_eq!(hash_query("a"), 5381 * 33 + 97);
    }

    #[test]
    fn progressive_hash_depends_on_variables() {
        let key = hash_query("query { getMods { count } }");
        let a = progressive_hash(key, &json!({ "modReference": "SML" }));
        let b = progressive_hash(key, &json!({ "modReference": "FicsitRemoteMonitoring" }));

        assert_ne!(a, b);
        assert_eq!(a, progressive_hash(key, &json!({ "modReference": "SML" })));
    }

    #[cfg(feature = "default-exchanges")]
    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex("{__typename}"),
            "ecf4edb46db40b5132295c0291d62fb65d6759a9eedfa4d5d612dd5ec54a6b38"
        );
    }
}
