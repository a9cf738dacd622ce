use std::fmt;

use log::debug;
use rand::prelude::*;

use crate::aes::{EcbCipher, BLOCK_SIZE, KEY_SIZE};
use crate::error::Result;
use crate::pkcs;

/// Escapes the record metacharacters so a value cannot smuggle extra
/// fields past the parser.
fn escape(v: &str) -> String {
    v.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}

fn unescape(v: &str) -> String {
    v.replace("%3D", "=").replace("%26", "&").replace("%25", "%")
}

/// An ordered key/value record, serialized as `k1=v1&k2=v2&...`. Insertion
/// order is preserved and duplicate keys are kept; both matter once
/// ciphertexts carrying records get spliced.
#[derive(Debug, PartialEq, Eq)]
pub struct Record(Vec<(String, String)>);

impl Record {
    pub fn new(fields: &[(&str, &str)]) -> Record {
        Record(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Parses `k=v&k=v&...`, keeping pair order and unescaping values. A
    /// pair without `=` becomes a key with an empty value.
    pub fn parse(input: &str) -> Record {
        Record(
            input
                .split('&')
                .map(|pair| {
                    let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                    (k.to_string(), unescape(v))
                })
                .collect(),
        )
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs = self.0.iter().peekable();
        while let Some((k, v)) = pairs.next() {
            write!(f, "{}={}", k, escape(v))?;
            if pairs.peek().is_some() {
                write!(f, "&")?;
            }
        }
        Ok(())
    }
}

/// Issues encrypted profile records for an email address and checks
/// submitted ciphertexts for the admin role. The key is fixed at
/// construction and never leaves the manager.
pub struct ProfileManager {
    ecb: EcbCipher,
}

impl ProfileManager {
    /// Builds a manager on a randomly drawn key.
    pub fn new() -> Result<ProfileManager> {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self::with_key(&key)
    }

    /// Builds a manager on a caller-supplied key, for reproducible runs.
    pub fn with_key(key: &[u8]) -> Result<ProfileManager> {
        Ok(ProfileManager {
            ecb: EcbCipher::new(key)?,
        })
    }

    /// Encrypts the profile record for `email`. The uid is fixed; varying
    /// uid widths would only shift the block arithmetic in the forgery, not
    /// defeat it.
    pub fn profile_for(&self, email: &str) -> Result<Vec<u8>> {
        let record = Record::new(&[("email", email), ("role", "user"), ("uid", "10")]);
        let padded = pkcs::pkcs7_pad(record.to_string().as_bytes(), BLOCK_SIZE)?;
        self.ecb.encrypt(&padded)
    }

    /// Decrypts and parses a submitted profile, reporting whether its first
    /// `role` field reads `admin`. Undecodable plaintext is simply not an
    /// admin.
    pub fn is_admin(&self, ct: &[u8]) -> Result<bool> {
        let clear = pkcs::pkcs7_unpad(&self.ecb.decrypt(ct)?)?;
        match String::from_utf8(clear) {
            Ok(text) => Ok(Record::parse(&text).get("role") == Some("admin")),
            Err(_) => Ok(false),
        }
    }
}

/// One crafted query of the forgery: the email to submit and the range of
/// ciphertext blocks to keep from the reply.
struct SpliceQuery {
    email: &'static str,
    blocks: std::ops::Range<usize>,
}

/// The three queries, in splice order. A profile serializes as
/// `email=<email>&role=user&uid=10`, so with 16-byte blocks:
///
///   head   |email=AAAAAAAAAA|AAAAAAAAAA&role=|user&uid=10.....|
///           keep blocks 0-1: the record up to and including "role="
///   admin  |email=AAAAAAAAAA|admin&role=user&|uid=10..........|
///           keep block 1: the forged role value plus the separators
///           that make the following field parse
///   tail   |email=fu@bar.io&|role=user&uid=10|pppppppppppppppp|
///           keep blocks 1-2: a trailing uid and a full padding block
///
/// Spliced back together the plaintext reads
/// `email=AAAAAAAAAAAAAAAAAAAA&role=admin&role=user&role=user&uid=10`
/// with valid padding, and the parser keeps the first of the duplicate
/// role fields.
const SPLICE_QUERIES: [SpliceQuery; 3] = [
    SpliceQuery {
        email: "AAAAAAAAAAAAAAAAAAAA",
        blocks: 0..2,
    },
    SpliceQuery {
        email: "AAAAAAAAAAadmin",
        blocks: 1..2,
    },
    SpliceQuery {
        email: "fu@bar.io",
        blocks: 1..3,
    },
];

/// Cut-and-paste forgery: three chosen emails line the serialized record up
/// on block boundaries, and splicing the replies produces a ciphertext the
/// manager itself reports as admin. The key is never touched.
pub fn forge_admin(manager: &ProfileManager) -> Result<Vec<u8>> {
    let mut forged = Vec::new();
    for q in &SPLICE_QUERIES {
        let ct = manager.profile_for(q.email)?;
        let keep = &ct[q.blocks.start * BLOCK_SIZE..q.blocks.end * BLOCK_SIZE];
        debug!("email {:?}: keeping blocks {:?}", q.email, q.blocks);
        forged.extend_from_slice(keep);
    }
    Ok(forged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let record = Record::new(&[("email", "foo@bar.com"), ("role", "user"), ("uid", "10")]);
        assert_eq!(record.to_string(), "email=foo@bar.com&role=user&uid=10");
        assert_eq!(Record::parse(&record.to_string()), record);
    }

    #[test]
    fn test_record_escapes_metacharacters() {
        for email in ["a&a", "b=b", "c=&c", "=", "&", "&&&==="] {
            let record = Record::new(&[("email", email), ("role", "user"), ("uid", "10")]);
            let s = record.to_string();
            assert_eq!(s.matches('&').count(), 2, "injected field in {}", s);
            assert_eq!(s.matches('=').count(), 3, "injected value in {}", s);
            // Unescaping restores the hostile value.
            assert_eq!(Record::parse(&s).get("email"), Some(email));
        }
    }

    #[test]
    fn test_record_first_key_wins() {
        let record = Record::parse("foo=bar&foo=baz&zap=zazzle");
        assert_eq!(record.get("foo"), Some("bar"));
        assert_eq!(record.get("zap"), Some("zazzle"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_profile_round_trip() {
        let manager = ProfileManager::with_key(b"YELLOW SUBMARINE").unwrap();
        let ct = manager.profile_for("foo@bar.com").unwrap();
        assert!(!manager.is_admin(&ct).unwrap());
    }

    #[test]
    fn test_splice_queries_align() {
        // The block arithmetic the forgery stands on, checked against the
        // serializer itself.
        let serialize = |email: &str| {
            Record::new(&[("email", email), ("role", "user"), ("uid", "10")]).to_string()
        };

        let head = serialize(SPLICE_QUERIES[0].email);
        assert_eq!(&head[..32], "email=AAAAAAAAAAAAAAAAAAAA&role=");

        let admin = serialize(SPLICE_QUERIES[1].email);
        assert_eq!(&admin[16..32], "admin&role=user&");

        let tail = serialize(SPLICE_QUERIES[2].email);
        assert_eq!(tail.len(), 32);
        assert_eq!(&tail[16..], "role=user&uid=10");
    }

    #[test]
    fn test_forge_admin() {
        let manager = ProfileManager::new().unwrap();
        let forged = forge_admin(&manager).unwrap();
        assert!(manager.is_admin(&forged).unwrap());
    }

    #[test]
    fn test_forge_admin_fixed_key() {
        let manager = ProfileManager::with_key(b"YELLOW SUBMARINE").unwrap();
        let forged = forge_admin(&manager).unwrap();
        assert_eq!(forged.len(), 5 * BLOCK_SIZE);
        assert!(manager.is_admin(&forged).unwrap());
    }
}
