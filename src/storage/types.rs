use uuid::Uuid;

const RESID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A posted text entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub resid: String,
    pub title: String,
    pub text: String,
}

/// A file attached to an entry through a shared `resid`.
///
/// The reference is logical only: nothing guarantees an entry with the same
/// `resid` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub resid: String,
    pub title: String,
    pub filename: String,
}

/// Generates a fresh entry identifier: a random v4 UUID written in base 36
/// (lowercase letters and digits, at most 25 characters).
pub fn generate_resid() -> String {
    let mut value = Uuid::new_v4().as_u128();
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(25);
    while value > 0 {
        digits.push(RESID_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
