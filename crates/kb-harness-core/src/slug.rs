//! URL-safe file identifiers.
//!
//! A slug is derived from the uploaded file name and must be unique within
//! its knowledge base. When the candidate slug is already taken by a
//! different file, [`disambiguate`] appends a short random suffix instead of
//! probing in a loop.

use rand::Rng;

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 50;

/// Base length kept when a random suffix is appended (`43 + 1 + 6 = 50`).
pub const DISAMBIGUATED_BASE_LEN: usize = 43;

/// Length of the random alphanumeric suffix.
pub const SUFFIX_LEN: usize = 6;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Derive the candidate slug for a file name.
///
/// Lower-cases the name, replaces every run of characters outside
/// `[a-z0-9]` with one dash, trims leading/trailing dashes, and truncates
/// to [`MAX_SLUG_LEN`].
///
/// ```rust
/// use kb_harness_core::slug::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("my_file 123!!.txt"), "my-file-123-txt");
/// ```
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    truncate(&out, MAX_SLUG_LEN)
}

/// Make a taken slug practically unique by appending `-` and a random suffix.
///
/// The base is cut to [`DISAMBIGUATED_BASE_LEN`] so the result never exceeds
/// [`MAX_SLUG_LEN`].
pub fn disambiguate<R: Rng + ?Sized>(slug: &str, rng: &mut R) -> String {
    let base = truncate(slug, DISAMBIGUATED_BASE_LEN);
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

// Slugs are ASCII, so byte slicing is safe; trailing dashes left by the cut are dropped.
fn truncate(slug: &str, max: usize) -> String {
    if slug.len() <= max {
        return slug.to_string();
    }
    slug[..max].trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_basic_slugs() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("my_file 123!!.txt"), "my-file-123-txt");
        assert_eq!(slugify("README.md"), "readme-md");
    }

    #[test]
    fn test_trims_dashes() {
        assert_eq!(slugify("--__Report (final)__--.pdf"), "report-final-pdf");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_non_ascii_becomes_separator() {
        assert_eq!(slugify("Café menü.txt"), "caf-men-txt");
    }

    #[test]
    fn test_truncates_to_max() {
        let long = "a".repeat(80) + ".txt";
        let slug = slugify(&long);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_truncation_drops_trailing_dash() {
        let name = format!("{} tail", "a".repeat(MAX_SLUG_LEN));
        assert_eq!(slugify(&name), "a".repeat(MAX_SLUG_LEN));
        let name = format!("{} b", "a".repeat(MAX_SLUG_LEN - 1));
        assert_eq!(slugify(&name), "a".repeat(MAX_SLUG_LEN - 1));
    }

    #[test]
    fn test_disambiguate_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let slug = disambiguate("hello-world", &mut rng);
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "hello-world");
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_disambiguate_respects_max_len() {
        let mut rng = StdRng::seed_from_u64(1);
        let slug = disambiguate(&"x".repeat(MAX_SLUG_LEN), &mut rng);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.starts_with(&"x".repeat(DISAMBIGUATED_BASE_LEN)));
    }

    #[test]
    fn test_disambiguate_differs_from_input() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = disambiguate("report-pdf", &mut rng);
        let b = disambiguate("report-pdf", &mut rng);
        assert_ne!(a, "report-pdf");
        assert_ne!(a, b);
    }
}
