use std::sync::Arc;

use async_trait::async_trait;

/// Supplies completion candidates for one parameter.
///
/// Providers may run work off the calling task (lookups, caches); the
/// engine awaits every provider of a completion request and merges the
/// results in tree-traversal order, never in completion order.
#[async_trait]
pub trait SuggestionProvider<S>: Send + Sync {
    async fn suggest(&self, source: &S) -> Vec<String>;
}

/// A provider backed by a fixed candidate list.
pub struct StaticSuggestions(Vec<String>);

impl StaticSuggestions {
    pub fn new<I, T>(candidates: I) -> Arc<Self>
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Arc::new(Self(
            candidates.into_iter().map(|c| c.to_string()).collect(),
        ))
    }
}

#[async_trait]
impl<S> SuggestionProvider<S> for StaticSuggestions
where
    S: Sync,
{
    async fn suggest(&self, _source: &S) -> Vec<String> {
        self.0.clone()
    }
}
