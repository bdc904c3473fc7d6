//! Cache key definitions.
//!
//! Keys are plain strings shared with anything else reading the remote cache,
//! so the format is fixed: `post_{language}_{heading}`, `lang_{language}_posts`,
//! `posts_meta`, `likes_{id}`, `views_{id}` and `aliases_{id}`.

use uuid::Uuid;

use crate::domain::headings::slug_form;

/// Identifies one entry in the remote cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single post snapshot addressed by language and heading (or slug).
    Post { language: String, heading: String },
    /// All posts of one language.
    LanguagePosts(String),
    /// Global listing metadata.
    PostsMeta,
    Likes(Uuid),
    Views(Uuid),
    /// Post keys a snapshot of this post was written under.
    Aliases(Uuid),
}

impl CacheKey {
    pub fn post(language: impl Into<String>, heading: impl Into<String>) -> Self {
        CacheKey::Post {
            language: language.into(),
            heading: heading.into(),
        }
    }

    /// Render the key, or `None` when an input normalizes to nothing.
    pub fn render(&self) -> Option<String> {
        match self {
            CacheKey::Post { language, heading } => {
                let language = normalize_language(language)?;
                let heading = normalize_heading(heading)?;
                Some(format!("post_{language}_{heading}"))
            }
            CacheKey::LanguagePosts(language) => {
                let language = normalize_language(language)?;
                Some(format!("lang_{language}_posts"))
            }
            CacheKey::PostsMeta => Some("posts_meta".to_string()),
            CacheKey::Likes(id) => Some(format!("likes_{id}")),
            CacheKey::Views(id) => Some(format!("views_{id}")),
            CacheKey::Aliases(id) => Some(format!("aliases_{id}")),
        }
    }
}

/// Convenience for the most common key.
pub fn post_key(language: &str, heading: &str) -> Option<String> {
    CacheKey::post(language, heading).render()
}

/// Key for a slug taken from a request, or `None` when the slug does not map
/// onto its key one-to-one.
///
/// Key normalization strips punctuation and folds whitespace, so
/// `css-basics!` and `css-basics` would share a key while resolving to
/// different results. Only slugs made of ASCII letters, digits, `-` and `_`
/// are cached; lowercasing is safe because every lookup strategy compares
/// case-insensitively.
pub fn request_post_key(language: &str, slug: &str) -> Option<String> {
    let exact = !slug.is_empty()
        && slug
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
    if exact { post_key(language, slug) } else { None }
}

/// Every key under which a post with this stored heading may be cached.
///
/// Requests may address a post by its heading or by its slug, and the two
/// produce different keys (`css_basics` vs `css-basics`). Headings with
/// punctuation are usually requested with the punctuation turned into a
/// separator (`HTML/CSS Intro` as `html-css-intro`), so those forms are
/// included too.
pub fn post_key_variants(language: &str, heading: &str) -> Vec<String> {
    let words: Vec<&str> = heading
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    let mut keys = Vec::with_capacity(4);
    for form in [
        heading.to_string(),
        slug_form(heading),
        words.join("-"),
        words.join("_"),
    ] {
        match post_key(language, &form) {
            Some(key) if !keys.contains(&key) => keys.push(key),
            _ => {}
        }
    }
    keys
}

fn normalize_language(language: &str) -> Option<String> {
    let language = language.trim().to_lowercase();
    if language.is_empty() {
        None
    } else {
        Some(language)
    }
}

fn normalize_heading(heading: &str) -> Option<String> {
    let joined = heading
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    let cleaned: String = joined
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-'))
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_key_normalizes_heading() {
        assert_eq!(
            post_key("CSS", "CSS Basics").as_deref(),
            Some("post_css_css_basics")
        );
        assert_eq!(
            post_key(" css ", "  CSS   Basics!? ").as_deref(),
            Some("post_css_css_basics")
        );
        assert_eq!(
            post_key("HTML", "html-elements").as_deref(),
            Some("post_html_html-elements")
        );
    }

    #[test]
    fn post_key_is_case_insensitive() {
        assert_eq!(
            post_key("Python", "List Comprehensions"),
            post_key("python", "list comprehensions")
        );
    }

    #[test]
    fn empty_inputs_yield_no_key() {
        assert_eq!(post_key("", "CSS Basics"), None);
        assert_eq!(post_key("CSS", "   "), None);
        assert_eq!(post_key("CSS", "!!!"), None);
        assert_eq!(CacheKey::LanguagePosts("  ".to_string()).render(), None);
    }

    #[test]
    fn rendered_keys_only_contain_safe_characters() {
        let key = post_key("C++", "Pointers & References (Part 2)").expect("key");
        let heading = key.trim_start_matches("post_c++_");
        assert!(
            heading
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
        );
        assert_eq!(heading, "pointers__references_part_2");
    }

    #[test]
    fn auxiliary_keys_follow_fixed_format() {
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::LanguagePosts("JavaScript".to_string()).render().as_deref(),
            Some("lang_javascript_posts")
        );
        assert_eq!(CacheKey::PostsMeta.render().as_deref(), Some("posts_meta"));
        assert_eq!(
            CacheKey::Likes(id).render(),
            Some(format!("likes_{id}"))
        );
        assert_eq!(
            CacheKey::Views(id).render(),
            Some(format!("views_{id}"))
        );
        assert_eq!(
            CacheKey::Aliases(id).render(),
            Some(format!("aliases_{id}"))
        );
    }

    #[test]
    fn variants_cover_heading_and_slug_forms() {
        let keys = post_key_variants("CSS", "CSS Basics");
        assert_eq!(keys, vec!["post_css_css_basics", "post_css_css-basics"]);
        assert!(keys.contains(&post_key("CSS", "css-basics").expect("slug key")));
        assert!(keys.contains(&post_key("CSS", "css_basics").expect("underscore key")));

        assert_eq!(post_key_variants("CSS", "Selectors"), vec!["post_css_selectors"]);
    }

    #[test]
    fn variants_cover_punctuated_headings() {
        let keys = post_key_variants("HTML", "HTML/CSS Intro");
        assert!(keys.contains(&"post_html_html-css-intro".to_string()));
        assert!(keys.contains(&"post_html_html_css_intro".to_string()));
        assert!(keys.contains(&"post_html_htmlcss_intro".to_string()));
    }

    #[test]
    fn request_keys_refuse_lossy_slugs() {
        assert_eq!(
            request_post_key("css", "CSS-Basics").as_deref(),
            Some("post_css_css-basics")
        );
        assert_eq!(
            request_post_key("css", "css_basics").as_deref(),
            Some("post_css_css_basics")
        );
        for slug in ["css-basics!", "css-basics?", "css+basics", "css basics", "", "ünïcode"] {
            assert_eq!(request_post_key("css", slug), None, "{slug:?}");
        }
    }
}
