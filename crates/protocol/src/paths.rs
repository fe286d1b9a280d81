/// Normalize a snapshot-relative path: forward slashes, no leading `./`, no
/// surrounding slashes. `.` and the empty string normalize to `""`.
pub fn normalize_rel_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.starts_with("./") {
        value = value[2..].to_string();
    }
    let value = value.trim_matches('/');
    if value == "." {
        return String::new();
    }
    value.to_string()
}

/// Join `base_dir` and a relative specifier, collapsing `.` and `..`
/// components. Returns `None` when the specifier climbs above the root.
pub fn join_rel_path(base_dir: &str, spec: &str) -> Option<String> {
    let mut parts: Vec<&str> = base_dir
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Directory portion of a normalized relative path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_leading_dot_slash_and_backslashes() {
        assert_eq!(normalize_rel_path("./src/a.ts"), "src/a.ts");
        assert_eq!(normalize_rel_path("././src\\b.ts"), "src/b.ts");
        assert_eq!(normalize_rel_path("."), "");
        assert_eq!(normalize_rel_path(" /lib/ "), "lib");
    }

    #[test]
    fn joins_relative_specifiers() {
        assert_eq!(join_rel_path("src/app", "./util").as_deref(), Some("src/app/util"));
        assert_eq!(join_rel_path("src/app", "../lib/x").as_deref(), Some("src/lib/x"));
        assert_eq!(join_rel_path("", "./b").as_deref(), Some("b"));
        assert_eq!(join_rel_path("", "../escape"), None);
    }

    #[test]
    fn parent_dir_of_top_level_file_is_empty() {
        assert_eq!(parent_dir("a.ts"), "");
        assert_eq!(parent_dir("src/deep/a.ts"), "src/deep");
    }
}
