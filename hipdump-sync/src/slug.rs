//! Filesystem-safe names for rooms and users.
//!
//! Non-ASCII text is NFKD-decomposed and reduced to its ASCII part, so
//! "Jürgen" becomes "Jurgen" and characters without an ASCII base vanish.
//! Anything other than alphanumerics, underscores, whitespace and hyphens is
//! removed, the result is trimmed, and runs of whitespace or hyphens become a
//! single hyphen. Case is preserved.

use crate::types::{Entity, EntityKind};
use regex_lite::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static pattern"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("static pattern"));

/// Converts a display name into a slug. Deterministic and idempotent;
/// distinct inputs may collide.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let kept = DISALLOWED.replace_all(&ascii, "");
    SEPARATORS.replace_all(kept.trim(), "-").into_owned()
}

/// Directory name for an entity of `kind`. Falls back to the remote id when
/// the base name has no ASCII content.
pub fn entity_slug(kind: EntityKind, entity: &Entity) -> String {
    let slug = slugify(&entity.base_name(kind));
    if slug.is_empty() {
        slugify(&entity.id_string())
    } else {
        slug
    }
}
