/*!
Asset reference classification.

An asset reference is a string naming a binary resource. Three forms exist:
local paths under managed storage (relocated into the archive), external
references (remote URLs or core-library paths, marked with a leading
sentinel and never touched), and wildcard references (a glob token that
expands to a set of local files sharing a prefix).
*/

/// Marker prefix denoting a reference intentionally left unresolved.
pub const EXTERNAL_SENTINEL: char = '*';

/// Classification of one asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetClass {
    /// Lives under managed storage; eligible for relocation.
    Local(String),
    /// Remote URL or already-marked external path; the payload carries no
    /// sentinel so it is never double-marked.
    External(String),
    /// Contains a glob token; `dir` may itself be remote, in which case
    /// expansion is unsupported.
    Wildcard { dir: String, pattern: String },
}

/// Classify a reference. Returns `None` for an empty reference, which
/// callers must skip entirely.
pub fn classify(reference: &str) -> Option<AssetClass> {
    if reference.is_empty() {
        return None;
    }
    if reference.starts_with(EXTERNAL_SENTINEL) {
        return Some(AssetClass::External(
            reference.trim_start_matches(EXTERNAL_SENTINEL).to_string(),
        ));
    }
    if reference.contains(EXTERNAL_SENTINEL) {
        return Some(AssetClass::Wildcard {
            dir: parent_dir(reference).to_string(),
            pattern: file_name(reference).to_string(),
        });
    }
    if is_remote(reference) {
        return Some(AssetClass::External(reference.to_string()));
    }
    Some(AssetClass::Local(percent_decode(reference)))
}

/// Whether a reference is an absolute remote URL.
pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Mark a reference as external.
pub fn mark_external(reference: &str) -> String {
    format!(
        "{}{}",
        EXTERNAL_SENTINEL,
        reference.trim_start_matches(EXTERNAL_SENTINEL)
    )
}

/// The final path component, after the last slash of either flavor.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Everything before the final path component (empty for bare filenames).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Drop a `?cache`/`?timestamp` query suffix from a filename.
pub fn strip_query(name: &str) -> &str {
    match name.find('?') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// File extensions a wildcard pattern constrains matches to, in the form
/// the storage browse call expects (`*.png` -> `[".png"]`; a bare `*`
/// matches anything).
pub fn pattern_extensions(pattern: &str) -> Vec<String> {
    match pattern.rsplit_once("*.") {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('*') => vec![format!(".{ext}")],
        _ => Vec::new(),
    }
}

/// Minimal percent-decoding for references stored URI-encoded.
///
/// Invalid escape sequences pass through unchanged.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reference_is_skipped() {
        assert_eq!(classify(""), None);
    }

    #[test]
    fn sentinel_reference_is_external_and_not_double_marked() {
        assert_eq!(
            classify("*icons/skills/axe.png"),
            Some(AssetClass::External("icons/skills/axe.png".to_string()))
        );
        // A previously double-marked reference still strips down to bare.
        assert_eq!(
            classify("**icons/skills/axe.png"),
            Some(AssetClass::External("icons/skills/axe.png".to_string()))
        );
        assert_eq!(mark_external("*a/b.png"), "*a/b.png");
    }

    #[test]
    fn remote_url_is_external() {
        assert_eq!(
            classify("https://example.com/x.png"),
            Some(AssetClass::External("https://example.com/x.png".to_string()))
        );
    }

    #[test]
    fn wildcard_splits_dir_and_pattern() {
        assert_eq!(
            classify("tokens/goblins/*.png"),
            Some(AssetClass::Wildcard {
                dir: "tokens/goblins".to_string(),
                pattern: "*.png".to_string(),
            })
        );
    }

    #[test]
    fn remote_wildcard_is_still_wildcard() {
        // The exporter decides that remote bases cannot be expanded; the
        // resolver just reports the shape.
        assert_eq!(
            classify("https://example.com/tokens/*.png"),
            Some(AssetClass::Wildcard {
                dir: "https://example.com/tokens".to_string(),
                pattern: "*.png".to_string(),
            })
        );
    }

    #[test]
    fn plain_path_is_local_and_decoded() {
        assert_eq!(
            classify("maps/the%20keep.jpg"),
            Some(AssetClass::Local("maps/the keep.jpg".to_string()))
        );
    }

    #[test]
    fn filename_helpers() {
        assert_eq!(file_name("a/b/c.png"), "c.png");
        assert_eq!(file_name("c.png"), "c.png");
        assert_eq!(file_name("a\\b\\c.png"), "c.png");
        assert_eq!(parent_dir("a/b/c.png"), "a/b");
        assert_eq!(parent_dir("c.png"), "");
        assert_eq!(strip_query("map.png?1699999999"), "map.png");
        assert_eq!(strip_query("map.png"), "map.png");
    }

    #[test]
    fn pattern_extension_extraction() {
        assert_eq!(pattern_extensions("*.png"), vec![".png".to_string()]);
        assert_eq!(pattern_extensions("goblin-*.webp"), vec![".webp".to_string()]);
        assert!(pattern_extensions("*").is_empty());
        assert!(pattern_extensions("goblin*").is_empty());
    }

    #[test]
    fn percent_decode_passes_invalid_sequences() {
        assert_eq!(percent_decode("a%2zb"), "a%2zb");
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
    }
}
