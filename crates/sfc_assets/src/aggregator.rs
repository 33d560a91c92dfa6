//! Per-module record of transformed stylesheet fragments.

use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use crate::pipeline::TransformedFragment;

/// Maps each document's module identity to its fragments, in resource order.
///
/// Written by document transforms, read by bundle assembly. Fragments are
/// handed out behind [`Arc`] so assembly never copies or mutates them.
#[derive(Debug, Default)]
pub struct StyleAggregator {
    modules: RwLock<FxHashMap<String, Vec<Arc<TransformedFragment>>>>,
}

impl StyleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment to a module's list.
    pub fn record(&self, module_id: &str, fragment: TransformedFragment) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules
            .entry(module_id.to_string())
            .or_default()
            .push(Arc::new(fragment));
    }

    /// Replace everything recorded for a module.
    ///
    /// Used on every (re)transform so stale fragments from a previous version
    /// of the document do not survive. An empty `fragments` still leaves an
    /// entry: the module is known and contributes no CSS.
    pub fn replace(&self, module_id: &str, fragments: Vec<TransformedFragment>) {
        let fragments: Vec<_> = fragments.into_iter().map(Arc::new).collect();
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(module_id, count = fragments.len(), "recorded style fragments");
        modules.insert(module_id.to_string(), fragments);
    }

    /// Forget a module, e.g. after the host deleted it.
    pub fn remove(&self, module_id: &str) -> bool {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.remove(module_id).is_some()
    }

    pub fn contains(&self, module_id: &str) -> bool {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.contains_key(module_id)
    }

    /// The fragments recorded for `module_id`; empty when none are.
    pub fn fragments(&self, module_id: &str) -> Vec<Arc<TransformedFragment>> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.get(module_id).cloned().unwrap_or_default()
    }

    /// Every known module identity, sorted.
    pub fn module_ids(&self) -> Vec<String> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = modules.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(code: &str) -> TransformedFragment {
        TransformedFragment {
            code: code.to_string(),
            map: None,
            source: "test.css".to_string(),
        }
    }

    fn codes(aggregator: &StyleAggregator, id: &str) -> Vec<String> {
        aggregator
            .fragments(id)
            .iter()
            .map(|f| f.code.clone())
            .collect()
    }

    #[test]
    fn test_record_appends_in_order() {
        let aggregator = StyleAggregator::new();
        aggregator.record("/a.html", fragment("a1"));
        aggregator.record("/a.html", fragment("a2"));
        assert_eq!(codes(&aggregator, "/a.html"), ["a1", "a2"]);
    }

    #[test]
    fn test_replace_discards_stale_fragments() {
        let aggregator = StyleAggregator::new();
        aggregator.replace("/a.html", vec![fragment("old1"), fragment("old2")]);
        aggregator.replace("/a.html", vec![fragment("new")]);
        assert_eq!(codes(&aggregator, "/a.html"), ["new"]);
    }

    #[test]
    fn test_empty_list_is_recorded() {
        let aggregator = StyleAggregator::new();
        aggregator.replace("/empty.html", Vec::new());
        assert!(aggregator.contains("/empty.html"));
        assert!(aggregator.fragments("/empty.html").is_empty());
        assert!(!aggregator.contains("/other.html"));
    }

    #[test]
    fn test_remove_and_module_ids() {
        let aggregator = StyleAggregator::new();
        aggregator.replace("/b.html", vec![fragment("b")]);
        aggregator.replace("/a.html", vec![fragment("a")]);
        assert_eq!(aggregator.module_ids(), ["/a.html", "/b.html"]);
        assert!(aggregator.remove("/a.html"));
        assert!(!aggregator.remove("/a.html"));
        assert_eq!(aggregator.module_ids(), ["/b.html"]);
        assert_eq!(aggregator.len(), 1);
    }
}
