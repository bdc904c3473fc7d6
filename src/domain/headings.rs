//! Heading normalization and the ordered strategies used to resolve a loose
//! heading slug (`css-basics`, `Html_Elements`) to a stored heading.
//!
//! Every strategy is a plain value carrying operands that were normalized
//! once per request. Stores translate strategies into their own query
//! language; [`HeadingStrategy::matches`] is the reference predicate that
//! every store must agree with.

/// Words in a slug are separated by hyphens or underscores.
const SLUG_SEPARATORS: [char; 2] = ['-', '_'];

/// Turn a slug into a "Title Case" candidate heading.
///
/// `css-basics` → `Css Basics`, `html_elements` → `Html Elements`. Only the
/// first letter of each word is changed; empty segments are dropped.
pub fn title_case_candidate(slug: &str) -> String {
    slug.trim()
        .split(SLUG_SEPARATORS)
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalized heading used by the flexible-whitespace index: lowercase,
/// trimmed, whitespace runs collapsed to one space.
pub fn heading_key(heading: &str) -> String {
    heading
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// URL slug form of a heading: lowercase, trimmed, whitespace runs → `-`.
pub fn slug_form(heading: &str) -> String {
    heading
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Case-insensitive `LIKE` pattern where every slug separator stands for
/// exactly one arbitrary character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    segments: Vec<String>,
}

impl WildcardPattern {
    fn from_slug(slug: &str) -> Self {
        let trimmed = slug.trim().trim_matches(SLUG_SEPARATORS);
        Self {
            segments: trimmed
                .split(SLUG_SEPARATORS)
                .map(str::to_lowercase)
                .collect(),
        }
    }

    /// Render as a SQL `LIKE` pattern using `\` as the escape character.
    pub fn to_like_pattern(&self) -> String {
        self.segments
            .iter()
            .map(|segment| escape_like(segment))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn matches(&self, heading: &str) -> bool {
        let heading: Vec<char> = heading.to_lowercase().chars().collect();
        let mut position = 0;

        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                // one wildcard character between segments
                if position >= heading.len() {
                    return false;
                }
                position += 1;
            }
            for expected in segment.chars() {
                if heading.get(position) != Some(&expected) {
                    return false;
                }
                position += 1;
            }
        }

        position == heading.len()
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// One step of the resolution ladder. Strategies are tried in order and the
/// first one yielding a published post wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingStrategy {
    /// Case-insensitive equality with the Title Case candidate.
    Exact { candidate: String },
    /// Case-insensitive equality with the raw slug, hyphens read as spaces.
    SpacedSlug { spaced: String },
    /// Equality on the whitespace-collapsed heading key.
    FlexibleWhitespace { key: String },
    /// Last resort: any of the lowered variants, or the wildcard pattern.
    Broadened {
        variants: Vec<String>,
        pattern: WildcardPattern,
    },
}

impl HeadingStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            HeadingStrategy::Exact { .. } => "exact",
            HeadingStrategy::SpacedSlug { .. } => "spaced_slug",
            HeadingStrategy::FlexibleWhitespace { .. } => "flexible_whitespace",
            HeadingStrategy::Broadened { .. } => "broadened",
        }
    }

    pub fn matches(&self, stored_heading: &str) -> bool {
        let lowered = stored_heading.to_lowercase();
        match self {
            HeadingStrategy::Exact { candidate } => lowered == *candidate,
            HeadingStrategy::SpacedSlug { spaced } => lowered == *spaced,
            HeadingStrategy::FlexibleWhitespace { key } => heading_key(stored_heading) == *key,
            HeadingStrategy::Broadened { variants, pattern } => {
                variants.iter().any(|variant| *variant == lowered) || pattern.matches(stored_heading)
            }
        }
    }
}

/// A parsed heading slug with its strategy ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingQuery {
    raw: String,
    candidate: String,
    strategies: Vec<HeadingStrategy>,
}

impl HeadingQuery {
    /// Returns `None` when the slug carries no usable characters.
    pub fn parse(raw_slug: &str) -> Option<Self> {
        let raw = raw_slug.trim().to_string();
        let candidate = title_case_candidate(&raw);
        if candidate.is_empty() {
            return None;
        }

        let candidate_lower = candidate.to_lowercase();
        let spaced = raw.replace('-', " ").to_lowercase();
        let raw_lower = raw.to_lowercase();

        let mut variants = vec![candidate_lower.clone(), raw_lower];
        variants.dedup();

        let strategies = vec![
            HeadingStrategy::Exact {
                candidate: candidate_lower.clone(),
            },
            HeadingStrategy::SpacedSlug { spaced },
            HeadingStrategy::FlexibleWhitespace {
                key: heading_key(&candidate_lower),
            },
            HeadingStrategy::Broadened {
                variants,
                pattern: WildcardPattern::from_slug(&raw),
            },
        ];

        Some(Self {
            raw,
            candidate,
            strategies,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    pub fn strategies(&self) -> &[HeadingStrategy] {
        &self.strategies
    }
}
