//! Names of the provider objects created for an access request.
//!
//! Everything is suffixed with the request's UID so that two requests for
//! the same template in one account never collide, and so that teardown can
//! find its objects again from the labels alone.

use rand::Rng;
use rand::distributions::Alphanumeric;

pub const UID_LENGTH: usize = 6;

/// Session name used when assuming a role for teardown
pub const CLEANUP_SESSION_NAME: &str = "FederatedRoleCleanup";

/// Fallback admin role present in customer-supplied accounts
pub const BYOC_ADMIN_ROLE_PREFIX: &str = "BYOCAdminAccess";

/// Fresh request UID: 6 lowercase alphanumerics
pub fn generate_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UID_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

fn with_uid(name: &str, uid: &str) -> String {
    let suffix = format!("-{}", uid);
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

pub fn role_name(template_name: &str, uid: &str) -> String {
    with_uid(template_name, uid)
}

pub fn policy_name(custom_policy_name: &str, uid: &str) -> String {
    with_uid(custom_policy_name, uid)
}

pub fn byoc_admin_role(uid: &str) -> String {
    format!("{}-{}", BYOC_ADMIN_ROLE_PREFIX, uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uid() {
        for _ in 0..50 {
            let uid = generate_uid();
            assert_eq!(uid.len(), UID_LENGTH);
            assert!(
                uid.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn test_names_carry_uid_once() {
        assert_eq!(role_name("read-only", "abc123"), "read-only-abc123");
        assert_eq!(policy_name("read-only-abc123", "abc123"), "read-only-abc123");
        assert_eq!(byoc_admin_role("abc123"), "BYOCAdminAccess-abc123");
    }
}
