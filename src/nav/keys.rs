/// Stable keys for async results and per-entity UI state. A field's key is
/// its absolute dot-path; option loads are namespaced so the result can be
/// routed back to the originating field.
pub fn options_key(field_path: &str) -> String {
    format!("form:opt:{field_path}")
}

pub fn field_from_options_key(key: &str) -> Option<&str> {
    key.strip_prefix("form:opt:")
}

/// Join a base scope with a relative field key into an absolute dot-path.
pub fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_key_round_trips() {
        let k = options_key("team.0.role");
        assert_eq!(field_from_options_key(&k), Some("team.0.role"));
        assert_eq!(field_from_options_key("other"), None);
    }

    #[test]
    fn join_handles_empty_base() {
        assert_eq!(join("", "title"), "title");
        assert_eq!(join("team.0", "name"), "team.0.name");
    }
}
