//! Scope token generation.
//!
//! A scope token namespaces one component's selectors. It is an Adler-style
//! checksum of the module identity rendered in base 36, so it is stable
//! across builds and only uses characters valid in class and attribute names.

/// Largest prime below 2^16.
const MODULUS: u32 = 65521;

/// Keeps tokens from starting with a digit, which is invalid in a class selector.
const PREFIX: &str = "s";

/// Derive the scope token for a module identity.
///
/// ```
/// let token = sfc_assets::scope_token("/src/components/Button.html");
/// assert_eq!(token, sfc_assets::scope_token("/src/components/Button.html"));
/// assert!(token.starts_with('s'));
/// ```
pub fn scope_token(module_id: &str) -> String {
    let mut low: u32 = 1;
    let mut high: u32 = 0;
    for unit in module_id.encode_utf16() {
        low = (low + u32::from(unit)) % MODULUS;
        high = (high + low) % MODULUS;
    }
    let checksum = (high << 16) | low;
    format!("{PREFIX}{}", to_base36(checksum))
}

fn to_base36(mut value: u32) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(7);
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
