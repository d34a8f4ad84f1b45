//! Purpose: Normalize a paste reference (hash or URL) to its raw-content URL.
//! Exports: `raw_url`.
//! Role: Pure string function shared by the fetcher and the CLI.
//! Invariants: Never fails; malformed input yields a URL that fails later at fetch time.
//! Invariants: Idempotent; an already-raw URL is returned unchanged.

const RAW_SUFFIX: &str = "/raw";

/// Builds the raw endpoint URL for `reference`.
///
/// `base_url` must end with `/`; `raw_template` carries a `{hash}` placeholder.
/// References under `base_url` get `/raw` appended unless already present, any
/// other value is treated as a bare hash.
pub fn raw_url(reference: &str, base_url: &str, raw_template: &str) -> String {
    let reference = reference.trim().trim_matches('"').trim();
    if reference.starts_with(base_url) {
        let trimmed = reference.trim_end_matches('/');
        if trimmed.ends_with(RAW_SUFFIX) {
            return trimmed.to_string();
        }
        return format!("{trimmed}{RAW_SUFFIX}");
    }
    raw_template.replace("{hash}", reference.trim_matches('/'))
}
