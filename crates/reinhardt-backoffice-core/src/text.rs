//! Small text helpers used for labels, slugs and locales.

use regex::Regex;
use std::sync::LazyLock;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[a-z][a-z0-9_-]*$").expect("SLUG_PATTERN: invalid regex pattern")
});

/// Convert a field name into a human-readable label.
///
/// # Examples
///
/// ```
/// use reinhardt_backoffice_core::text::humanize_field_name;
///
/// assert_eq!(humanize_field_name("first_name"), "First name");
/// assert_eq!(humanize_field_name("hero-image"), "Hero image");
/// ```
pub fn humanize_field_name(name: &str) -> String {
	let spaced = name
		.trim_start_matches('_')
		.replace(['_', '-'], " ")
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
		.to_lowercase();
	let mut chars = spaced.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Lowercase, hyphen-separated slug.
///
/// # Examples
///
/// ```
/// use reinhardt_backoffice_core::text::slugify;
///
/// assert_eq!(slugify("Hero Section!"), "hero-section");
/// ```
pub fn slugify(text: &str) -> String {
	text.to_lowercase()
		.chars()
		.map(|ch| match ch {
			'a'..='z' | '0'..='9' => ch,
			_ => '-',
		})
		.collect::<String>()
		.split('-')
		.filter(|s| !s.is_empty())
		.collect::<Vec<_>>()
		.join("-")
}

/// Content-type slug rule: lowercase ASCII, digits, `-` or `_`, leading letter.
pub fn is_valid_slug(slug: &str) -> bool {
	SLUG_PATTERN.is_match(slug)
}

/// Both `-` and `_` spellings of an identifier, original first.
pub fn alias_variants(name: &str) -> Vec<String> {
	let mut variants = vec![name.to_string()];
	for alias in [name.replace('-', "_"), name.replace('_', "-")] {
		if !variants.contains(&alias) {
			variants.push(alias);
		}
	}
	variants
}

/// Locales are compared lowercased and trimmed.
pub fn normalize_locale(locale: &str) -> String {
	locale.trim().to_lowercase()
}

pub fn escape_html(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	for ch in input.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#x27;"),
			_ => out.push(ch),
		}
	}
	out
}
