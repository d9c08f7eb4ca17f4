//! Naming-convention conversion between struct identifiers and storage identifiers.
//!
//! Struct type names use capitalized segments (`UserOrder`); table and column
//! names use underscore-separated lowercase (`user_order`). Conversion is
//! lossless from external to storage and back for names made of letters and
//! digits with no leading separator.

/// Convert an external-cased name to storage casing.
///
/// A separator is inserted before each interior uppercase letter that follows
/// a non-separator character, then the whole name is lowercased.
///
/// ```
/// assert_eq!(curd_core::ident::to_storage("UserName"), "user_name");
/// ```
pub fn to_storage(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a storage-cased name to external casing.
///
/// Splits on the separator, uppercases the first letter of each segment and
/// concatenates. Empty segments from consecutive separators are skipped.
///
/// ```
/// assert_eq!(curd_core::ident::to_external("user_name"), "UserName");
/// ```
pub fn to_external(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for segment in name.split('_') {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
