//! Locale-aware text matching for item filtering.
//!
//! [`Filter`] provides substring, prefix, and suffix matching with
//! configurable case sensitivity. Filters are memoized per
//! [`FilterOptions`]: requesting the same options twice returns the same
//! shared instance, so derived-list recomputation keyed on the filter stays
//! referentially stable.
//!
//! Prefix and suffix matching is grapheme-aware: boundaries are compared on
//! extended grapheme clusters, so a match never splits a user-perceived
//! character.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use unicode_segmentation::UnicodeSegmentation;

/// Controls how matching handles letter case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaseSensitivity {
    /// Case-sensitive matching (e.g. "App" won't match "apple").
    CaseSensitive,
    /// Case-insensitive matching (e.g. "App" will match "apple").
    #[default]
    CaseInsensitive,
}

/// Options a [`Filter`] is constructed from.
///
/// The locale is kept as a BCP 47 tag. Folding is currently
/// locale-independent Unicode lowercasing; the tag selects the memoization
/// slot and is reported alongside matches in trace logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterOptions {
    /// BCP 47 locale tag, e.g. `"en-US"`.
    pub locale: String,
    /// How to handle letter case when matching.
    pub case_sensitivity: CaseSensitivity,
}

impl FilterOptions {
    /// Options for an explicit locale with default (insensitive) casing.
    pub fn for_locale(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            case_sensitivity: CaseSensitivity::default(),
        }
    }

    /// Options derived from the system locale, falling back to `en-US`.
    pub fn system() -> Self {
        Self::for_locale(sys_locale::get_locale().unwrap_or_else(|| "en-US".to_string()))
    }

    /// Set the case sensitivity using builder pattern.
    pub fn with_case_sensitivity(mut self, sensitivity: CaseSensitivity) -> Self {
        self.case_sensitivity = sensitivity;
        self
    }
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self::system()
    }
}

/// A memoized, locale-aware text matcher.
///
/// Obtain instances through [`Filter::for_options`] or [`Filter::system`];
/// direct construction is intentionally unavailable so equal options always
/// yield the same shared instance.
#[derive(Debug)]
pub struct Filter {
    options: FilterOptions,
}

fn filter_cache() -> &'static Mutex<HashMap<FilterOptions, Arc<Filter>>> {
    static CACHE: OnceLock<Mutex<HashMap<FilterOptions, Arc<Filter>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

impl Filter {
    /// Get (or create) the shared filter for `options`.
    pub fn for_options(options: FilterOptions) -> Arc<Filter> {
        let mut cache = filter_cache().lock();
        cache
            .entry(options.clone())
            .or_insert_with(|| Arc::new(Filter { options }))
            .clone()
    }

    /// The shared filter for the system locale with default casing.
    pub fn system() -> Arc<Filter> {
        Self::for_options(FilterOptions::system())
    }

    /// The options this filter was built from.
    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    fn fold(&self, text: &str) -> String {
        match self.options.case_sensitivity {
            CaseSensitivity::CaseSensitive => text.to_string(),
            CaseSensitivity::CaseInsensitive => text.to_lowercase(),
        }
    }

    /// Whether `haystack` contains `needle`. An empty needle matches
    /// everything.
    pub fn contains(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.fold(haystack).contains(&self.fold(needle))
    }

    /// Whether `haystack` starts with `needle`, compared on grapheme
    /// boundaries. An empty needle matches everything.
    pub fn starts_with(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let mut hay = haystack.graphemes(true);
        for expected in needle.graphemes(true) {
            match hay.next() {
                Some(g) if self.fold(g) == self.fold(expected) => {}
                _ => return false,
            }
        }
        true
    }

    /// Whether `haystack` ends with `needle`, compared on grapheme
    /// boundaries. An empty needle matches everything.
    pub fn ends_with(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let hay: Vec<&str> = haystack.graphemes(true).collect();
        let tail: Vec<&str> = needle.graphemes(true).collect();
        if tail.len() > hay.len() {
            return false;
        }
        hay[hay.len() - tail.len()..]
            .iter()
            .zip(tail.iter())
            .all(|(h, n)| self.fold(h) == self.fold(n))
    }

    /// Whether `haystack` and `needle` are equal under this filter's folding.
    pub fn matches_exactly(&self, haystack: &str, needle: &str) -> bool {
        self.fold(haystack) == self.fold(needle)
    }
}
