use deunicode::deunicode_with_tofu;

/// Slug returned when normalization leaves nothing behind.
pub const EMPTY_SLUG: &str = "n-a";

/// Build a URL slug from free text.
///
/// Steps:
/// - transliterate to ASCII (characters without a transliteration are dropped)
/// - lowercase
/// - collapse every run of non-alphanumeric characters into a single `-`
/// - trim leading/trailing `-`
///
/// Never fails; an empty result becomes [`EMPTY_SLUG`].
pub fn slugify(text: &str) -> String {
    let ascii = deunicode_with_tofu(text.trim(), "");
    let mut out = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        return EMPTY_SLUG.to_string();
    }
    out
}
