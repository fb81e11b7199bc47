//! Storage keys: the filesystem-safe form of a project's display name.

pub type StorageKey = String;

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// The mapping is not injective: `"a/b"` and `"a_b"` both yield `"a_b"`.
/// Nothing is trimmed, so `" x"` and `"_x"` collide as well.
pub fn sanitize_storage_key(raw: &str) -> StorageKey {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(sanitize_storage_key("My Project!"), "My_Project_");
        assert_eq!(sanitize_storage_key("a/b"), "a_b");
        assert_eq!(sanitize_storage_key("../../etc"), "______etc");
        assert_eq!(sanitize_storage_key("keep-this_one9"), "keep-this_one9");
    }

    #[test]
    fn one_underscore_per_character() {
        assert_eq!(sanitize_storage_key("café"), "caf_");
        assert_eq!(sanitize_storage_key("日本"), "__");
    }

    #[test]
    fn distinct_names_can_share_a_key() {
        assert_eq!(sanitize_storage_key("a/b"), sanitize_storage_key("a_b"));
        assert_eq!(sanitize_storage_key("a b"), sanitize_storage_key("a.b"));
    }
}
