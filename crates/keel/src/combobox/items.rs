//! Derived filtered-item computation.
//!
//! The derived items engine turns the raw `items` input and the current
//! query into the list the popup actually shows. Filtering is applied
//! per-group for grouped sources, empty groups are dropped, and an optional
//! result limit is enforced as a running total across groups in declaration
//! order.
//!
//! Results are memoized: the engine caches the last `(items generation,
//! query, mode, limit)` key and returns the same shared result for repeated
//! identical inputs, so downstream consumers keyed on referential identity
//! do not recompute spuriously.

use std::sync::Arc;

use crate::combobox::filter::Filter;

/// A named group of items.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    /// Stable key identifying the group (rendered as the group heading).
    pub key: String,
    /// The group's items, in declaration order.
    pub items: Vec<T>,
}

impl<T> Group<T> {
    /// Create a group.
    pub fn new(key: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            key: key.into(),
            items,
        }
    }
}

/// The raw item input: a flat ordered sequence or a sequence of groups.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSource<T> {
    /// Ungrouped items.
    Flat(Vec<T>),
    /// Grouped items; group order and in-group order are both preserved.
    Grouped(Vec<Group<T>>),
}

impl<T> ItemSource<T> {
    /// Total number of items across all groups.
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(items) => items.len(),
            Self::Grouped(groups) => groups.iter().map(|g| g.items.len()).sum(),
        }
    }

    /// Whether the source holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the source is grouped.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }
}

impl<T: Clone> ItemSource<T> {
    /// Flatten to the ordered item sequence (group order preserved).
    pub fn flatten(&self) -> Vec<T> {
        match self {
            Self::Flat(items) => items.clone(),
            Self::Grouped(groups) => groups
                .iter()
                .flat_map(|g| g.items.iter().cloned())
                .collect(),
        }
    }
}

impl<T> Default for ItemSource<T> {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

/// Cap on the number of derived items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    /// No cap.
    #[default]
    Unlimited,
    /// At most this many items, counted across groups in declaration order.
    Max(usize),
}

impl Limit {
    /// Whether `count` has reached the cap.
    fn reached(&self, count: usize) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Max(max) => count >= *max,
        }
    }

    /// Remaining capacity given `count` items already taken.
    fn remaining(&self, count: usize) -> usize {
        match self {
            Self::Unlimited => usize::MAX,
            Self::Max(max) => max.saturating_sub(count),
        }
    }
}

/// How the query is applied to the raw items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// No filtering: every item passes (the filter was explicitly disabled).
    Passthrough,
    /// Plain substring matching of the query against item labels.
    Substring,
    /// Single mode with a committed selection and no query edit since the
    /// popup opened: the input still *represents* the selection, so the full
    /// list is shown rather than filtering by the stringified selection.
    SelectionAware,
}

/// The trimmed query string. An empty query means "no filter — show all
/// items up to the limit".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query(String);

impl Query {
    /// Build a query from the raw input value, trimming surrounding
    /// whitespace.
    pub fn from_input(input: &str) -> Self {
        Self(input.trim().to_string())
    }

    /// The trimmed query text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the query is empty (show all).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The derived, visible item list.
#[derive(Debug, Clone, PartialEq)]
pub enum FilteredItems<T> {
    /// Flat result.
    Flat(Vec<T>),
    /// Grouped result; empty groups have already been dropped.
    Grouped(Vec<Group<T>>),
}

impl<T> FilteredItems<T> {
    /// An empty flat result.
    pub fn empty() -> Self {
        Self::Flat(Vec::new())
    }

    /// Total number of visible items.
    pub fn visible_count(&self) -> usize {
        match self {
            Self::Flat(items) => items.len(),
            Self::Grouped(groups) => groups.iter().map(|g| g.items.len()).sum(),
        }
    }

    /// Whether no items are visible.
    pub fn is_empty(&self) -> bool {
        self.visible_count() == 0
    }

    /// The visible groups, if grouped.
    pub fn groups(&self) -> Option<&[Group<T>]> {
        match self {
            Self::Flat(_) => None,
            Self::Grouped(groups) => Some(groups),
        }
    }
}

impl<T: Clone> FilteredItems<T> {
    /// Flatten to the ordered visible-item sequence (group order preserved).
    pub fn flatten(&self) -> Vec<T> {
        match self {
            Self::Flat(items) => items.clone(),
            Self::Grouped(groups) => groups
                .iter()
                .flat_map(|g| g.items.iter().cloned())
                .collect(),
        }
    }
}

/// Pure derivation of the filtered list.
///
/// `label_of` extracts the text an item is matched against. `filter` is the
/// matcher for [`FilterMode::Substring`]; it is unused in the other modes.
pub fn derive_filtered_items<T: Clone>(
    source: &ItemSource<T>,
    query: &Query,
    filter: &Filter,
    label_of: &dyn Fn(&T) -> String,
    mode: FilterMode,
    limit: Limit,
) -> FilteredItems<T> {
    let passes = |item: &T| -> bool {
        match mode {
            FilterMode::Passthrough | FilterMode::SelectionAware => true,
            FilterMode::Substring => {
                query.is_empty() || filter.contains(&label_of(item), query.as_str())
            }
        }
    };

    match source {
        ItemSource::Flat(items) => {
            let mut taken = Vec::new();
            for item in items {
                if limit.reached(taken.len()) {
                    break;
                }
                if passes(item) {
                    taken.push(item.clone());
                }
            }
            FilteredItems::Flat(taken)
        }
        ItemSource::Grouped(groups) => {
            let mut total = 0usize;
            let mut out = Vec::new();
            for group in groups {
                if limit.reached(total) {
                    break;
                }
                let remaining = limit.remaining(total);
                let matched: Vec<T> = group
                    .items
                    .iter()
                    .filter(|item| passes(item))
                    .take(remaining)
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    continue;
                }
                total += matched.len();
                out.push(Group::new(group.key.clone(), matched));
            }
            FilteredItems::Grouped(out)
        }
    }
}

/// Memoization key for one derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    generation: u64,
    query: Query,
    mode: FilterMode,
    limit: Limit,
}

/// Memoizing wrapper around [`derive_filtered_items`].
///
/// The engine owns the label extractor and the matcher; the raw item source
/// lives with the root, which bumps the generation whenever it changes.
pub struct DerivedItemsEngine<T> {
    filter: Arc<Filter>,
    label_of: Arc<dyn Fn(&T) -> String + Send + Sync>,
    generation: u64,
    cache: Option<(CacheKey, Arc<FilteredItems<T>>)>,
}

impl<T: Clone> DerivedItemsEngine<T> {
    /// Create an engine matching with `filter` and extracting labels with
    /// `label_of`.
    pub fn new(filter: Arc<Filter>, label_of: Arc<dyn Fn(&T) -> String + Send + Sync>) -> Self {
        Self {
            filter,
            label_of,
            generation: 0,
            cache: None,
        }
    }

    /// Record that the raw item source changed, invalidating the cache key.
    pub fn invalidate_items(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cache = None;
    }

    /// Current item-source generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Derive (or return the memoized) filtered list.
    pub fn derive(
        &mut self,
        source: &ItemSource<T>,
        query: &Query,
        mode: FilterMode,
        limit: Limit,
    ) -> Arc<FilteredItems<T>> {
        let key = CacheKey {
            generation: self.generation,
            query: query.clone(),
            mode,
            limit,
        };

        if let Some((cached_key, cached)) = &self.cache {
            if *cached_key == key {
                return cached.clone();
            }
        }

        let label_of = self.label_of.clone();
        let result = Arc::new(derive_filtered_items(
            source,
            query,
            &self.filter,
            &*label_of,
            mode,
            limit,
        ));
        self.cache = Some((key, result.clone()));
        result
    }
}

impl<T> std::fmt::Debug for DerivedItemsEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedItemsEngine")
            .field("generation", &self.generation)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combobox::filter::FilterOptions;

    fn filter() -> Arc<Filter> {
        Filter::for_options(FilterOptions::for_locale("en-US"))
    }

    fn label(item: &String) -> String {
        item.clone()
    }

    fn fruits() -> ItemSource<String> {
        ItemSource::Flat(vec!["Apple".into(), "Banana".into(), "Cherry".into()])
    }

    #[test]
    fn test_substring_filtering() {
        let result = derive_filtered_items(
            &fruits(),
            &Query::from_input("an"),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Unlimited,
        );
        assert_eq!(result, FilteredItems::Flat(vec!["Banana".to_string()]));
    }

    #[test]
    fn test_empty_query_shows_all() {
        let result = derive_filtered_items(
            &fruits(),
            &Query::from_input("   "),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Unlimited,
        );
        assert_eq!(result.visible_count(), 3);
    }

    #[test]
    fn test_passthrough_and_selection_aware_ignore_query() {
        for mode in [FilterMode::Passthrough, FilterMode::SelectionAware] {
            let result = derive_filtered_items(
                &fruits(),
                &Query::from_input("zzz"),
                &filter(),
                &label,
                mode,
                Limit::Unlimited,
            );
            assert_eq!(result.visible_count(), 3);
        }
    }

    #[test]
    fn test_limit_on_flat_list() {
        let result = derive_filtered_items(
            &fruits(),
            &Query::default(),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Max(2),
        );
        assert_eq!(
            result,
            FilteredItems::Flat(vec!["Apple".to_string(), "Banana".to_string()])
        );
    }

    fn grouped() -> ItemSource<String> {
        ItemSource::Grouped(vec![
            Group::new("citrus", vec!["Lemon".into(), "Lime".into()]),
            Group::new("berries", vec!["Blueberry".into(), "Strawberry".into()]),
            Group::new("stone", vec!["Peach".into()]),
        ])
    }

    #[test]
    fn test_grouped_filtering_drops_empty_groups() {
        let result = derive_filtered_items(
            &grouped(),
            &Query::from_input("berry"),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Unlimited,
        );
        let groups = result.groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "berries");
        assert_eq!(groups[0].items.len(), 2);
    }

    #[test]
    fn test_limit_is_running_total_across_groups() {
        let result = derive_filtered_items(
            &grouped(),
            &Query::default(),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Max(3),
        );
        let groups = result.groups().unwrap();
        // Two from citrus, truncated to one from berries, stone never reached.
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].items, vec!["Lemon".to_string(), "Lime".to_string()]);
        assert_eq!(groups[1].items, vec!["Blueberry".to_string()]);
        assert_eq!(result.visible_count(), 3);
    }

    #[test]
    fn test_flatten_preserves_declaration_order() {
        let result = derive_filtered_items(
            &grouped(),
            &Query::default(),
            &filter(),
            &label,
            FilterMode::Substring,
            Limit::Unlimited,
        );
        assert_eq!(
            result.flatten(),
            vec!["Lemon", "Lime", "Blueberry", "Strawberry", "Peach"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_engine_memoizes_identical_inputs() {
        let mut engine =
            DerivedItemsEngine::new(filter(), Arc::new(|item: &String| item.clone()));
        let source = fruits();
        let query = Query::from_input("an");

        let first = engine.derive(&source, &query, FilterMode::Substring, Limit::Unlimited);
        let second = engine.derive(&source, &query, FilterMode::Substring, Limit::Unlimited);
        assert!(Arc::ptr_eq(&first, &second));

        engine.invalidate_items();
        let third = engine.derive(&source, &query, FilterMode::Substring, Limit::Unlimited);
        assert!(!Arc::ptr_eq(&first, &third));
        // Structurally the derivation is idempotent.
        assert_eq!(*first, *third);
    }
}
