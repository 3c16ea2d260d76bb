//! Allowlist enforcement for the chat adapter.
//!
//! Deny-by-default: empty lists mean no one is allowed. Wildcard `"*"`
//! allows everyone. User and group ids are matched exactly — the platform
//! issues opaque case-sensitive ids.

/// Returns `true` when the sending user (or the group the message came
/// from) is permitted to issue commands.
pub fn is_allowed(
    allow_users: &[String],
    allow_groups: &[String],
    user_id: &str,
    group_id: Option<&str>,
) -> bool {
    let user_ok = allow_users
        .iter()
        .any(|entry| entry == "*" || entry == user_id);
    if user_ok {
        return true;
    }
    match group_id {
        Some(gid) => allow_groups.iter().any(|entry| entry == "*" || entry == gid),
        None => false,
    }
}
