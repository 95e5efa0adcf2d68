//! Flag and switch extraction.
//!
//! Each usage gets a character trie over its flag names and aliases.
//! Extraction scans a prefix-stripped token left to right, taking the
//! longest registered alias at every position, so `silent` never decays
//! into `s` plus garbage. A compressed token like `-tp` may name several
//! flags at once under the homogeneity rule: all switches, or all value
//! flags of one input type sharing the following value token.

use std::collections::HashMap;

use legate::parameter::Parameter;
use legate::{Error, Result};

use crate::config::EngineConfig;

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    /// Index into `registered` when a flag alias ends here.
    end_of_flag: Option<usize>,
}

/// The per-usage flag automaton.
pub struct FlagExtractor<S> {
    root: TrieNode,
    registered: Vec<Parameter<S>>,
}

impl<S> FlagExtractor<S> {
    /// Builds an extractor from the flag parameters found in `parameters`.
    /// Non-flag parameters are ignored; duplicate flag names keep the
    /// first registration.
    pub fn from_parameters<'a, I>(parameters: I) -> Self
    where
        I: IntoIterator<Item = &'a Parameter<S>>,
        S: 'a,
    {
        let mut extractor = Self {
            root: TrieNode::default(),
            registered: Vec::new(),
        };

        for parameter in parameters {
            if parameter.is_flag() {
                extractor.insert(parameter.clone());
            }
        }

        extractor
    }

    fn insert(&mut self, parameter: Parameter<S>) {
        if self.registered.iter().any(|p| p.name == parameter.name) {
            return;
        }

        let index = self.registered.len();
        self.insert_alias(&parameter.name, index);
        if let Some(flag) = &parameter.flag {
            for alias in &flag.aliases {
                self.insert_alias(alias, index);
            }
        }

        self.registered.push(parameter);
    }

    fn insert_alias(&mut self, alias: &str, index: usize) {
        let mut node = &mut self.root;
        for c in alias.chars() {
            node = node.children.entry(c).or_default();
        }
        node.end_of_flag = Some(index);
    }

    /// All flag parameters known to this extractor, in registration
    /// order.
    pub fn registered(&self) -> &[Parameter<S>] {
        &self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Looks up a flag by exact name or alias.
    pub fn find(&self, label: &str) -> Option<&Parameter<S>> {
        let mut node = &self.root;
        for c in label.chars() {
            node = node.children.get(&c)?;
        }
        node.end_of_flag.map(|i| &self.registered[i])
    }

    /// Extracts all flags named by a prefix-stripped token.
    ///
    /// Greedy longest-match: at each position the longest alias ending
    /// exactly at a flag boundary wins. Characters belonging to no
    /// registered alias fail the whole token.
    pub fn extract(&self, input: &str) -> Result<Vec<&Parameter<S>>> {
        let chars: Vec<char> = input.chars().collect();
        let mut extracted: Vec<usize> = Vec::new();
        let mut unmatched = String::new();

        let mut position = 0;
        while position < chars.len() {
            match self.longest_match(&chars[position..]) {
                Some((index, length)) => {
                    if !extracted.contains(&index) {
                        extracted.push(index);
                    }
                    position += length;
                }
                None => {
                    unmatched.push(chars[position]);
                    position += 1;
                }
            }
        }

        if !unmatched.is_empty() {
            return Err(Error::UnknownFlag { input: unmatched });
        }

        Ok(extracted.into_iter().map(|i| &self.registered[i]).collect())
    }

    /// Finds the longest registered alias starting at the front of
    /// `chars`. Returns the flag index and the match length.
    fn longest_match(&self, chars: &[char]) -> Option<(usize, usize)> {
        let mut node = &self.root;
        let mut best = None;

        for (i, c) in chars.iter().enumerate() {
            node = match node.children.get(c) {
                Some(node) => node,
                None => break,
            };

            if let Some(index) = node.end_of_flag {
                best = Some((index, i + 1));
            }
        }

        best
    }
}

/// Enforces the shorthand homogeneity rule on an extracted flag set:
/// either all switches, or all value flags of one input type. Returns
/// `true` when the set consists of switches.
pub fn validate_shorthand<S>(extracted: &[&Parameter<S>]) -> Result<bool> {
    let switches = extracted.iter().filter(|p| p.is_switch()).count();

    if switches != 0 && switches != extracted.len() {
        return Err(Error::ShorthandFlagMix);
    }

    if switches == 0 && extracted.len() > 1 {
        let first = extracted[0].type_id();
        if extracted[1..].iter().any(|p| p.type_id() != first) {
            return Err(Error::ShorthandFlagType);
        }
    }

    Ok(switches == extracted.len())
}

/// Marks the raw tokens that belong to flag handling: recognized flag
/// tokens plus, for value flags, the following value token. Masked
/// tokens are transparent to positional matching.
///
/// `primary` is the active usage's extractor; `fallback` covers flags
/// registered elsewhere on the same command so a misplaced flag still
/// does not corrupt positional alignment (the flag pass reports it).
pub fn compute_mask<S>(
    raws: &[String],
    config: &EngineConfig,
    primary: &FlagExtractor<S>,
    fallback: Option<&FlagExtractor<S>>,
) -> Vec<bool> {
    let mut mask = vec![false; raws.len()];

    let mut i = 0;
    while i < raws.len() {
        let raw = &raws[i];
        if !config.is_flag_token(raw) {
            i += 1;
            continue;
        }

        let stripped = config.strip_flag_prefix(raw);
        let extracted = match primary.extract(stripped) {
            Ok(extracted) => Some(extracted),
            Err(_) => fallback.and_then(|f| f.extract(stripped).ok()),
        };

        match extracted {
            Some(extracted) if !extracted.is_empty() => {
                mask[i] = true;
                // A set of value flags consumes the next token as its
                // shared value.
                if extracted.iter().all(|p| p.is_true_flag()) && i + 1 < raws.len() {
                    mask[i + 1] = true;
                    i += 1;
                }
            }
            _ => (),
        }

        i += 1;
    }

    mask
}
