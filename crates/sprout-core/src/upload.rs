//! Generated names for uploaded photo files
//!
//! Client-supplied names never reach the filesystem. Only a short,
//! alphanumeric extension is carried over.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;

const TOKEN_LEN: usize = 8;
const MAX_EXTENSION_LEN: usize = 8;

/// Generate `<unix-millis>-<token><.ext>` for an uploaded file
#[must_use]
pub fn generate_filename(original_name: Option<&str>) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();

    let millis = Utc::now().timestamp_millis();
    match original_name.and_then(safe_extension) {
        Some(ext) => format!("{millis}-{token}.{ext}"),
        None => format!("{millis}-{token}"),
    }
}

/// Lowercased extension if it is short and purely alphanumeric
fn safe_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::validate_file_name;

    #[test]
    fn test_keeps_simple_extension() {
        let name = generate_filename(Some("IMG_0001.JPG"));
        assert!(name.ends_with(".jpg"), "{name}");
        assert!(validate_file_name(&name).is_ok());
    }

    #[test]
    fn test_drops_hostile_names() {
        for original in ["../../etc/passwd", "a.j/pg", "photo.tar.gz;rm", "noext", ".bashrc"] {
            let name = generate_filename(Some(original));
            assert!(validate_file_name(&name).is_ok(), "{original} -> {name}");
            assert!(!name.contains("passwd"));
        }
    }

    #[test]
    fn test_names_do_not_collide() {
        let a = generate_filename(Some("a.png"));
        let b = generate_filename(Some("a.png"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_shape() {
        let name = generate_filename(None);
        let (millis, token) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(token.len(), TOKEN_LEN);
    }
}
