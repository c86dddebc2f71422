use rand::Rng;

/// URL-safe alphabet used for opaque generated identifiers.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a random, URL-safe, opaque identifier of `len` characters.
///
/// At `len == 16` with a 62-symbol alphabet this carries roughly 95 bits of
/// entropy, comfortably above the 80-bit floor the repository record id
/// requires.
pub fn generate_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
