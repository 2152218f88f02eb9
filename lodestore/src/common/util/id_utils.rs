use rand::distributions::Alphanumeric;
use rand::Rng;

/// Returns a random alphanumeric identifier of `len` characters.
pub fn uid(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
