//! DNS-1123 subdomain validation
//!
//! The cluster DNS domain ends up baked into service discovery and
//! certificates, so it is validated up front instead of letting
//! `kubeadm init` fail with an opaque error later.

/// Maximum length of a DNS-1123 subdomain
pub const MAX_SUBDOMAIN_LEN: usize = 253;

/// Check whether a string is a valid DNS-1123 subdomain
///
/// A valid subdomain consists of one or more labels separated by `.`, where
/// each label is lower case alphanumeric characters or `-`, starts and ends
/// with an alphanumeric character, and the whole name is at most 253
/// characters.
pub fn is_dns1123_subdomain(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_SUBDOMAIN_LEN {
        return false;
    }
    name.split('.').all(is_dns1123_label)
}

fn is_dns1123_label(label: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    let bytes = label.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
