//! Identifier generation for pids and channel ids.

use alloc::string::String;

use wos_hal::Sandbox;

use crate::error::KernelError;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Attempts before giving up on a collision-free identifier
pub const MAX_ID_ATTEMPTS: usize = 64;

/// Draw one random base-36 identifier of `len` characters.
pub fn random_id<S: Sandbox>(sandbox: &S, len: usize) -> Result<String, KernelError> {
    let mut bytes = alloc::vec![0u8; len];
    sandbox.random_bytes(&mut bytes)?;
    Ok(bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect())
}

/// Draw identifiers until one is not `taken`.
pub fn unique_id<S, F>(sandbox: &S, len: usize, taken: F) -> Result<String, KernelError>
where
    S: Sandbox,
    F: Fn(&str) -> bool,
{
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = random_id(sandbox, len)?;
        if !taken(&id) {
            return Ok(id);
        }
    }
    Err(KernelError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use wos_hal_mock::MockSandbox;

    #[test]
    fn test_alphabet_and_length() {
        let sandbox = MockSandbox::new();
        let id = random_id(&sandbox, 7).unwrap();
        assert_eq!(id.len(), 7);
        assert!(id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_retries_on_collision() {
        let sandbox = MockSandbox::new();
        sandbox.script_entropy(vec![0]);
        sandbox.script_entropy(vec![0]);
        sandbox.script_entropy(vec![1]);
        let id = unique_id(&sandbox, 3, |id| id == "000").unwrap();
        assert_eq!(id, "111");
    }

    #[test]
    fn test_exhausted() {
        let sandbox = MockSandbox::new();
        assert_eq!(
            unique_id(&sandbox, 1, |_| true),
            Err(KernelError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
        );
    }
}
