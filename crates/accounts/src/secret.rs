//! Client credential generation.
//!
//! The plaintext secret generated here is returned to the caller exactly once
//! and never stored; the aggregate only ever sees its digest. Generation
//! happens at command-construction time so the aggregate stays deterministic.

use rand::Rng;
use rand::distributions::Alphanumeric;

const CLIENT_ID_SUFFIX_LEN: usize = 16;
const SECRET_LEN: usize = 43;

/// Generate a client identifier candidate.
///
/// Uniqueness per tenant is enforced against the read model before the create
/// command is dispatched, not here.
pub fn generate_client_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CLIENT_ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("svc-{}", suffix.to_lowercase())
}

/// Generate a high-entropy plaintext client secret.
pub fn generate_client_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_carry_the_prefix_and_differ() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(a.starts_with("svc-"));
        assert_eq!(a.len(), 4 + CLIENT_ID_SUFFIX_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn secrets_have_fixed_length_and_differ() {
        let a = generate_client_secret();
        let b = generate_client_secret();
        assert_eq!(a.len(), SECRET_LEN);
        assert_ne!(a, b);
    }
}
