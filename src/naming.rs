//! Centralized naming conventions for published files.
//!
//! Two things are derived from paths throughout the gate, and both live here
//! so they stay consistent:
//!
//! ## Post identity
//!
//! A published post is a page directly under the post directory, in one of
//! two layouts:
//! - `blog/my-first-post.html` → slug "my-first-post"
//! - `blog/my-first-post/index.html` → slug "my-first-post"
//!
//! Listing pages share the layout but are not posts:
//! `blog/index.html`, `blog/page/index.html`, `blog/tags.html`, and so on.
//!
//! ## Display Titles
//!
//! Image sources become readable alternate text:
//! - `/img/sunset-over-the-bay.jpg?w=800` → "Sunset Over The Bay"
//! - `photos/team_offsite_2024.png` → "Team Offsite 2024"

/// Slugs that name listing pages rather than posts.
pub const LISTING_SLUGS: &[&str] = &[
    "index",
    "page",
    "tag",
    "tags",
    "category",
    "categories",
    "feed",
];

/// Title used when a source carries no usable name.
pub const FALLBACK_TITLE: &str = "Image";

/// Slug of the post at `relative` (a `/`-separated path under the site root),
/// or `None` when the file is not a published post.
///
/// - `"blog/hello.html"` with post dir `"blog"` → `Some("hello")`
/// - `"blog/hello/index.html"` → `Some("hello")`
/// - `"blog/index.html"`, `"blog/tags/index.html"` → `None` (listings)
/// - `"blog/2024/hello/index.html"`, `"about/index.html"` → `None`
pub fn post_slug(relative: &str, post_dir: &str) -> Option<String> {
    let post_dir = post_dir.trim_matches('/');
    let rest = relative
        .trim_start_matches('/')
        .strip_prefix(post_dir)?
        .strip_prefix('/')?;
    let segments: Vec<&str> = rest.split('/').collect();
    let slug = match segments.as_slice() {
        [file] => file.strip_suffix(".html")?,
        [dir, "index.html"] => *dir,
        _ => return None,
    };
    if slug.is_empty() || LISTING_SLUGS.contains(&slug.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(slug.to_string())
}

/// Display title derived from an image source.
///
/// Query and fragment, directories, and the extension are dropped; `-`, `_`
/// and path separators become spaces; each word is capitalized. `data:` URIs
/// and sources with no name left get [`FALLBACK_TITLE`].
pub fn title_from_path(src: &str) -> String {
    let src = src.trim();
    if src.is_empty() || src.to_ascii_lowercase().starts_with("data:") {
        return FALLBACK_TITLE.to_string();
    }
    let path = src.split(['?', '#']).next().unwrap_or_default();
    let file = path.trim_end_matches('/').rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    };

    let words: Vec<String> = stem
        .split(['-', '_', '/', '\\', ' ', '+'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    if words.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
