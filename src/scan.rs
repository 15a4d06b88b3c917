//! Pure filename and text classification for sensitive-content signals.
//!
//! No I/O and no shared state; everything here is a stateless function over
//! its arguments so callers can use it from any worker.

use std::sync::LazyLock;

/// Keywords that suggest credential material when they appear in text.
const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "api_key",
    "private_key",
    "auth",
    "credential",
    "token",
];

/// Filename shapes that mark a file as configuration.
static CONFIG_FILE_PATTERNS: LazyLock<Vec<regex::Regex>> = LazyLock::new(|| {
    [
        r"\.env(\.\w+)?$",
        r"\.config$",
        r"config\.\w+$",
        r"\.ya?ml$",
        r"\.json$",
        r"\.xml$",
        r"\.properties$",
        r"\.ini$",
        r"\.conf$",
        r"\.cfg$",
        r"\.toml$",
    ]
    .iter()
    .map(|pattern| regex::Regex::new(pattern).expect("invalid pattern"))
    .collect()
});

/// Whether the filename looks like a configuration file.
#[must_use]
pub fn is_config_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    CONFIG_FILE_PATTERNS.iter().any(|pattern| pattern.is_match(&lower))
}

/// Whether the filename by itself suggests stored credentials.
#[must_use]
pub fn is_secret_file(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.contains("secret")
        || lower.contains("credential")
        || lower.contains(".env")
        || lower.contains("id_rsa")
        || lower.contains(".htpasswd")
}

/// Number of distinct sensitive keywords appearing in `text`. Case-insensitive.
#[must_use]
pub fn sensitive_hits(text: &str) -> usize {
    let lower = text.to_ascii_lowercase();
    SENSITIVE_KEYWORDS.iter().filter(|keyword| lower.contains(*keyword)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_files_are_recognized() {
        assert!(is_config_file(".env"));
        assert!(is_config_file(".env.production"));
        assert!(is_config_file("config.json"));
        assert!(is_config_file("application.yml"));
        assert!(is_config_file("settings.TOML"));
        assert!(is_config_file("app.config"));

        assert!(!is_config_file("main.rs"));
        assert!(!is_config_file("README.md"));
    }

    #[test]
    fn secret_files_are_recognized() {
        assert!(is_secret_file(".env"));
        assert!(is_secret_file("secrets.json"));
        assert!(is_secret_file("credentials.json"));
        assert!(is_secret_file("id_rsa"));

        assert!(!is_secret_file("config.yml"));
        assert!(!is_secret_file("docker-compose.yml"));
    }

    #[test]
    fn keyword_hits_are_counted_once_each() {
        let text = "export PASSWORD=hunter2\npassword again\nAPI_KEY=abc\n";
        assert_eq!(sensitive_hits(text), 2);
        assert_eq!(sensitive_hits("nothing to see"), 0);
        assert_eq!(sensitive_hits(""), 0);
    }
}
