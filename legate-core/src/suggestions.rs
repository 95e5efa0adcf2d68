//! Tab-completion.
//!
//! Reuses the command tree: the cursor's depth selects a set of
//! candidate nodes (a union, since optional parameters may or may not
//! consume earlier tokens), and each candidate contributes literal
//! labels, provider results or static type suggestions. Provider futures
//! are awaited together and merged in traversal order, never in
//! completion order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use legate::parameter::{Parameter, ParameterKind};
use legate::permissions::PermissionChecker;
use legate::suggestions::SuggestionProvider;

use crate::config::EngineConfig;
use crate::flags;
use crate::tree::{CommandTree, NodeKind};

/// Fallback suggestion providers by parameter type name, owned by the
/// dispatcher. Consulted when a parameter has no provider of its own,
/// before the type's static candidates.
pub struct SuggestionRegistry<S> {
    providers: HashMap<String, Arc<dyn SuggestionProvider<S>>>,
}

impl<S> SuggestionRegistry<S> {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, type_name: impl ToString, provider: Arc<dyn SuggestionProvider<S>>) {
        self.providers.insert(type_name.to_string(), provider);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn SuggestionProvider<S>>> {
        self.providers.get(type_name)
    }
}

impl<S> Default for SuggestionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

enum CandidateSource<'a, S> {
    Ready(Vec<String>),
    Provider(&'a Arc<dyn SuggestionProvider<S>>),
}

/// Completion candidates for one command, given the tokens already
/// typed after the command label and the partially typed final token.
pub(crate) async fn complete<S>(
    tree: &CommandTree<S>,
    tokens: &[String],
    prefix: &str,
    source: &S,
    checker: &dyn PermissionChecker<S>,
    config: &EngineConfig,
    registry: &SuggestionRegistry<S>,
) -> Vec<String>
where
    S: Sync,
{
    let all_flags = tree.all_flags();
    let mask = flags::compute_mask(tokens, config, all_flags, None);

    // A trailing value flag means the user is typing that flag's value.
    if let Some(last) = tokens.last() {
        if config.is_flag_token(last) {
            if let Ok(extracted) = all_flags.extract(config.strip_flag_prefix(last)) {
                if !extracted.is_empty() && extracted.iter().all(|p| p.is_true_flag()) {
                    let mut sources = Vec::new();
                    for parameter in extracted {
                        push_parameter_source(parameter, registry, &mut sources);
                    }
                    return finish(sources, source, prefix, config).await;
                }
            }
        }
    }

    let mut sources: Vec<CandidateSource<'_, S>> = Vec::new();
    for node in tree.completion_targets(tokens, &mask, config) {
        match &node.kind {
            NodeKind::Literal {
                labels,
                permission,
                open_suggestions,
            } => {
                if config.check_suggestion_permissions
                    && !*open_suggestions
                    && !permission.evaluate(source, checker)
                {
                    continue;
                }
                sources.push(CandidateSource::Ready(labels.clone()));
            }
            NodeKind::Param(parameter) => {
                if config.check_suggestion_permissions
                    && !parameter.permission.is_true()
                    && !parameter.permission.evaluate(source, checker)
                {
                    continue;
                }
                push_parameter_source(parameter, registry, &mut sources);
            }
        }
    }

    // Flag names, minus flags already present in the input.
    let used: HashSet<&str> = tokens
        .iter()
        .filter(|t| config.is_flag_token(t))
        .filter_map(|t| all_flags.extract(config.strip_flag_prefix(t)).ok())
        .flatten()
        .map(|p| p.name.as_str())
        .collect();

    let mut flag_labels = Vec::new();
    for parameter in all_flags.registered() {
        if used.contains(parameter.name.as_str()) {
            continue;
        }
        flag_labels.push(format!("{}{}", config.flag_prefix, parameter.name));
        if let Some(flag) = &parameter.flag {
            for alias in &flag.aliases {
                flag_labels.push(format!("{}{}", config.flag_prefix, alias));
            }
        }
    }
    if !flag_labels.is_empty() {
        sources.push(CandidateSource::Ready(flag_labels));
    }

    finish(sources, source, prefix, config).await
}

fn push_parameter_source<'a, S>(
    parameter: &'a Parameter<S>,
    registry: &'a SuggestionRegistry<S>,
    sources: &mut Vec<CandidateSource<'a, S>>,
) {
    if let Some(provider) = &parameter.suggestions {
        sources.push(CandidateSource::Provider(provider));
        return;
    }
    if let Some(provider) = registry.get(&parameter.type_id()) {
        sources.push(CandidateSource::Provider(provider));
        return;
    }
    if let ParameterKind::Value(kind) = &parameter.kind {
        sources.push(CandidateSource::Ready(kind.suggestions()));
    }
}

async fn finish<S>(
    sources: Vec<CandidateSource<'_, S>>,
    source: &S,
    prefix: &str,
    config: &EngineConfig,
) -> Vec<String>
where
    S: Sync,
{
    // join_all keeps input order, so merged results stay in traversal
    // order regardless of which provider finishes first.
    let results = join_all(sources.into_iter().map(|s| async move {
        match s {
            CandidateSource::Ready(candidates) => candidates,
            CandidateSource::Provider(provider) => provider.suggest(source).await,
        }
    }))
    .await;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in results.into_iter().flatten() {
        if !starts_with(&candidate, prefix, config.ignore_case) {
            continue;
        }
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

pub(crate) fn starts_with(candidate: &str, prefix: &str, ignore_case: bool) -> bool {
    if prefix.is_empty() {
        return true;
    }
    if ignore_case {
        candidate
            .get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
    } else {
        candidate.starts_with(prefix)
    }
}
