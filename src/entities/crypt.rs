//! SHA-512 based password hashing in the `$6$` crypt format used by glibc.
use rand::seq::SliceRandom as _;
use sha2::{Digest, Sha512};

const ROUNDS: usize = 5000;
const SALT_LEN: usize = 16;
const ALPHABET: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Byte triples of the final digest, in output order.
const PERMUTATION: [(usize, usize, usize); 21] = [
    (0, 21, 42),
    (22, 43, 1),
    (44, 2, 23),
    (3, 24, 45),
    (25, 46, 4),
    (47, 5, 26),
    (6, 27, 48),
    (28, 49, 7),
    (50, 8, 29),
    (9, 30, 51),
    (31, 52, 10),
    (53, 11, 32),
    (12, 33, 54),
    (34, 55, 13),
    (56, 14, 35),
    (15, 36, 57),
    (37, 58, 16),
    (59, 17, 38),
    (18, 39, 60),
    (40, 61, 19),
    (62, 20, 41),
];

/// A random salt drawn from the crypt alphabet.
pub fn random_salt() -> String {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN)
        .filter_map(|_| ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect()
}

/// Repeat `block` cyclically until `len` bytes are produced.
fn stretch(block: &[u8], len: usize) -> Vec<u8> {
    block.iter().copied().cycle().take(len).collect()
}

fn encode24(b2: u8, b1: u8, b0: u8, chars: usize, out: &mut String) {
    let mut w = (u32::from(b2) << 16) | (u32::from(b1) << 8) | u32::from(b0);
    for _ in 0..chars {
        if let Some(&c) = ALPHABET.get((w & 0x3f) as usize) {
            out.push(char::from(c));
        }
        w >>= 6;
    }
}

/// Hash `password` with `salt` (truncated to 16 bytes), returning `$6$salt$hash`.
pub fn sha512_crypt(password: &str, salt: &str) -> String {
    let key = password.as_bytes();
    let salt = salt.get(..SALT_LEN.min(salt.len())).unwrap_or(salt);
    let salt_bytes = salt.as_bytes();

    let alternate = Sha512::new()
        .chain_update(key)
        .chain_update(salt_bytes)
        .chain_update(key)
        .finalize();

    let mut hasher = Sha512::new()
        .chain_update(key)
        .chain_update(salt_bytes)
        .chain_update(stretch(&alternate, key.len()));
    let mut n = key.len();
    while n > 0 {
        if n & 1 == 1 {
            hasher.update(&alternate);
        } else {
            hasher.update(key);
        }
        n >>= 1;
    }
    let mut digest = hasher.finalize();

    let mut dp = Sha512::new();
    for _ in 0..key.len() {
        dp.update(key);
    }
    let p_bytes = stretch(&dp.finalize(), key.len());

    let mut ds = Sha512::new();
    for _ in 0..16 + usize::from(digest.first().copied().unwrap_or_default()) {
        ds.update(salt_bytes);
    }
    let s_bytes = stretch(&ds.finalize(), salt_bytes.len());

    for round in 0..ROUNDS {
        let mut c = Sha512::new();
        if round % 2 == 1 {
            c.update(&p_bytes);
        } else {
            c.update(&digest);
        }
        if round % 3 != 0 {
            c.update(&s_bytes);
        }
        if round % 7 != 0 {
            c.update(&p_bytes);
        }
        if round % 2 == 1 {
            c.update(&digest);
        } else {
            c.update(&p_bytes);
        }
        digest = c.finalize();
    }

    let byte = |i: usize| digest.get(i).copied().unwrap_or_default();
    let mut out = format!("$6${salt}$");
    for (a, b, c) in PERMUTATION {
        encode24(byte(a), byte(b), byte(c), 4, &mut out);
    }
    encode24(0, 0, byte(63), 2, &mut out);
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_vector() {
        assert_eq!(
            sha512_crypt("Hello world!", "saltstring"),
            "$6$saltstring$svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1"
        );
    }

    #[test]
    fn salt_is_truncated() {
        let long = sha512_crypt("pw", "0123456789abcdefXYZ");
        assert!(long.starts_with("$6$0123456789abcdef$"));
    }

    #[test]
    fn random_salt_uses_crypt_alphabet() {
        let salt = random_salt();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(salt.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn hash_has_fixed_length() {
        let hash = sha512_crypt("secret", "abc");
        let encoded = hash.rsplit('$').next().unwrap();
        assert_eq!(encoded.len(), 86);
    }
}
