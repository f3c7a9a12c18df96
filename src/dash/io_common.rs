use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// An output target that means the standard output.
pub fn is_stdout(target: &Option<String>) -> bool {
    match target {
        None => true,
        Some(x) => x.is_empty() || x == "stdout",
    }
}

/// Joins a dataset file name onto a directory or a URL prefix.
///
/// URLs are kept as they are. Absolute paths are kept only under a local
/// base; under a URL base a leading slash is relative to the base.
pub fn join_location(base: &str, name: &str) -> String {
    if is_remote(name) {
        return name.to_string();
    }
    if is_remote(base) {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    } else {
        // join() already keeps an absolute name.
        Path::new(base).join(name).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls_and_paths() {
        assert_eq!(
            join_location("https://host/data/", "poverty.csv"),
            "https://host/data/poverty.csv"
        );
        assert_eq!(
            join_location("http://host", "/poverty.csv"),
            "http://host/poverty.csv"
        );
        assert_eq!(
            join_location("public/data", "poverty.csv"),
            Path::new("public/data").join("poverty.csv").display().to_string()
        );
        assert_eq!(
            join_location("public/data", "https://mirror/p.csv"),
            "https://mirror/p.csv"
        );
    }

    #[test]
    fn leading_slash_stays_on_the_server() {
        assert_eq!(
            join_location("https://host/data", "/constituency_2024.csv"),
            "https://host/data/constituency_2024.csv"
        );
        let abs = Path::new("/srv/poverty.csv");
        if abs.is_absolute() {
            assert_eq!(
                join_location("public/data", "/srv/poverty.csv"),
                "/srv/poverty.csv"
            );
        }
    }

    #[test]
    fn stdout_targets() {
        assert!(is_stdout(&None));
        assert!(is_stdout(&Some("".to_string())));
        assert!(is_stdout(&Some("stdout".to_string())));
        assert!(!is_stdout(&Some("out.html".to_string())));
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("public/data/poverty.csv"), "poverty.csv");
        assert_eq!(
            simplify_file_name("https://host/data/budgetary.csv"),
            "budgetary.csv"
        );
    }
}
