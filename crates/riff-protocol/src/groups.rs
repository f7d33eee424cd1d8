//! Group naming.

/// Prefix of every per-user group name.
pub const GROUP_PREFIX: &str = "user-";

/// Group that receives events for `identity`.
pub fn user_group(identity: &str) -> String {
    format!("{GROUP_PREFIX}{identity}")
}

/// Identity a group name belongs to, if it is a well-formed user group.
pub fn identity_of_group(group: &str) -> Option<&str> {
    group
        .strip_prefix(GROUP_PREFIX)
        .filter(|identity| !identity.is_empty())
}
