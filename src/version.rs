//! Version string helpers.
//!
//! Versions are opaque strings: two versions differ when their normalized
//! text differs. No semantic ordering is attempted.

/// Version of this launcher build
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Strip surrounding whitespace and a single leading `v`/`V` marker
pub fn normalize(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

/// True iff both versions are known and their normalized forms are unequal
pub fn differs(current: Option<&str>, latest: Option<&str>) -> bool {
    match (current, latest) {
        (Some(current), Some(latest)) => normalize(current) != normalize(latest),
        _ => false,
    }
}
