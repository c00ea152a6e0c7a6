//! Deterministic media filenames derived from post titles.

/// Extension given to every uploaded featured image.
const IMAGE_EXTENSION: &str = "jpg";

/// Stem used when a title has no ASCII alphanumerics at all.
const FALLBACK_STEM: &str = "featured-image";

/// Generate a URL-safe slug from a title.
///
/// Lower-cases, collapses every run of non-ASCII-alphanumeric characters to a
/// single `-`, and trims leading/trailing separators. Idempotent.
pub fn slugify(title: &str) -> String {
    title
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Filename for the featured image uploaded alongside a post.
pub fn media_filename(title: &str) -> String {
    let slug = slugify(title);
    let stem = if slug.is_empty() { FALLBACK_STEM } else { &slug };
    format!("{stem}.{IMAGE_EXTENSION}")
}
