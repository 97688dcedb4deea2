/// Random identifiers: block slugs, verification codes and access keys
///
/// Every generator takes the RNG explicitly and requires `CryptoRng`, so
/// callers pass `rand::thread_rng()` (a CSPRNG reseeded from the OS) in
/// production and a seeded `StdRng` in tests. Nothing here keeps
/// process-wide random state.
///
/// # Example
///
/// ```
/// use vuedoo_shared::ids::{generate_numeric_code, generate_slug, SLUG_LENGTH};
///
/// let mut rng = rand::thread_rng();
/// let slug = generate_slug(&mut rng);
/// assert_eq!(slug.len(), SLUG_LENGTH);
///
/// let code = generate_numeric_code(&mut rng, 6);
/// assert_eq!(code.len(), 6);
/// ```

use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Length of generated block slugs
pub const SLUG_LENGTH: usize = 15;

/// Digits in a login verification code
pub const VERIFICATION_CODE_DIGITS: usize = 6;

/// Lowercase alphanumerics keep slugs URL-safe and case-insensitive
const SLUG_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a block slug of [`SLUG_LENGTH`] characters
///
/// 36^15 possibilities; uniqueness is still enforced by the `blocks.slug`
/// constraint.
pub fn generate_slug<R: Rng + CryptoRng>(rng: &mut R) -> String {
    (0..SLUG_LENGTH)
        .map(|_| SLUG_CHARSET[rng.gen_range(0..SLUG_CHARSET.len())] as char)
        .collect()
}

/// Generates a numeric code with exactly `digits` digits and no leading zero
pub fn generate_numeric_code<R: Rng + CryptoRng>(rng: &mut R, digits: usize) -> String {
    assert!(digits > 0 && digits <= 18, "code length out of range");

    let low = 10u64.pow(digits as u32 - 1);
    let high = low * 10;
    rng.gen_range(low..high).to_string()
}

/// Generates an opaque access key (UUID v4 text)
pub fn generate_access_key<R: Rng + CryptoRng>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

/// SHA-256 hex digest of a verification code, as stored in metas
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks that a slug could have come from [`generate_slug`] or a client
///
/// Client supplied slugs may be any length up to 64 but must stay within the
/// URL-safe alphabet plus `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 64
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// Parses an access key, rejecting anything that is not a UUID
pub fn parse_access_key(key: &str) -> Option<Uuid> {
    Uuid::parse_str(key).ok()
}
