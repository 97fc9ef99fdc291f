//! Longest-prefix routing of virtual paths to storage policies.

use polyfs_config::{normalize_virtual_path, with_trailing_slash, Policy};

/// Pick the policy whose mount path is the longest prefix of `path`.
///
/// Both sides are compared with a trailing slash so `/photos` never claims
/// `/photos2/x`. Ties cannot happen for distinct mount paths.
pub fn longest_prefix_match<'a>(policies: &'a [Policy], path: &str) -> Option<&'a Policy> {
    let request = with_trailing_slash(&normalize_virtual_path(path));

    let mut best: Option<(&Policy, usize)> = None;
    for policy in policies {
        let mount = policy.mount_prefix();
        if !request.starts_with(&mount) {
            continue;
        }
        if best.map_or(true, |(_, len)| mount.len() > len) {
            best = Some((policy, mount.len()));
        }
    }

    best.map(|(policy, _)| policy)
}

/// Build a virtual path from root-first name segments.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let joined: Vec<&str> = segments
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty() && *s != "/")
        .collect();
    normalize_virtual_path(&joined.join("/"))
}
