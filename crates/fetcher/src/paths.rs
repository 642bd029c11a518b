use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const DEFAULT_EXTENSION: &str = "mp3";

/// Where a downloaded call lives:
/// `<root>/<species_id>/<species-slug>-<8 hex of sha256(url)>.<ext>`.
///
/// The same inputs always give the same path, which is what lets a re-run
/// find a file fetched earlier without asking the database first.
pub fn asset_path(root: &Path, species_id: i64, species_name: &str, url: &str, extension: &str) -> PathBuf {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let file_name = format!("{}-{}.{}", slugify(species_name), &digest[..8], extension);
    root.join(species_id.to_string()).join(file_name)
}

/// Lowercase ASCII words joined by single dashes. Apostrophes are dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().filter(|c| *c != '\'') {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("call");
    }
    slug
}

/// The file extension of the URL's last path segment, if it looks like one.
pub fn source_extension(url: &str) -> String {
    let path = reqwest::Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
