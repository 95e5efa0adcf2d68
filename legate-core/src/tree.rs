//! The registered command tree.
//!
//! Every usage of a command inserts its positional parameter sequence as
//! a path below the command's literal root; shared prefixes merge into
//! one node. Subcommands insert a literal child and recurse. The tree is
//! built once at registration, verified for ambiguity, and read-only
//! afterwards: dispatch and tab-completion both walk it.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

use legate::command::{Command, CommandUsage};
use legate::parameter::{label_matches, Parameter, ParameterKind};
use legate::permissions::PermissionCondition;
use legate::Error;

use crate::ambiguity::{self, RegistrationError};
use crate::config::EngineConfig;
use crate::flags::{self, FlagExtractor};

pub(crate) enum NodeKind<S> {
    /// A command or subcommand label.
    Literal {
        labels: Vec<String>,
        permission: PermissionCondition,
        open_suggestions: bool,
    },
    /// A positional value parameter.
    Param(Parameter<S>),
}

pub(crate) struct Node<S> {
    pub(crate) kind: NodeKind<S>,
    pub(crate) depth: usize,
    /// Children, literals ordered before parameters.
    pub(crate) children: Vec<Node<S>>,
    /// Set when a usage terminates exactly at this node.
    pub(crate) terminal: Option<Terminal<S>>,
}

/// An executable endpoint of the tree.
pub struct Terminal<S> {
    pub usage: Arc<CommandUsage<S>>,
    /// The full positional path from the root: subcommand steps appear
    /// as command-typed parameters, so the pipeline sees a parameter
    /// list aligned with the raw tokens.
    pub parameters: Arc<Vec<Parameter<S>>>,
    /// The usage's flag automaton.
    pub flags: Arc<FlagExtractor<S>>,
    /// Command labels from the root command to the owning subcommand.
    pub path: Vec<String>,
}

impl<S> Terminal<S> {
    /// Renders the full usage, e.g. `ban <target> [reason...] [-silent]`.
    pub fn format(&self) -> String {
        let mut parts = vec![self.path[0].clone()];
        parts.extend(self.parameters.iter().map(|p| p.format()));
        parts.extend(self.flags.registered().iter().map(|p| p.format()));
        parts.join(" ")
    }
}

impl<S> Clone for Terminal<S> {
    fn clone(&self) -> Self {
        Self {
            usage: self.usage.clone(),
            parameters: self.parameters.clone(),
            flags: self.flags.clone(),
            path: self.path.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Terminal<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal").field("path", &self.path).finish()
    }
}

/// A step of a usage path during insertion: the pipeline-facing
/// parameter plus, for subcommand steps, the literal node metadata.
struct Step<S> {
    param: Parameter<S>,
    literal: Option<LiteralMeta>,
}

struct LiteralMeta {
    labels: Vec<String>,
    permission: PermissionCondition,
    open_suggestions: bool,
}

pub struct CommandTree<S> {
    pub(crate) root: Node<S>,
    all_flags: Arc<FlagExtractor<S>>,
}

impl<S> std::fmt::Debug for CommandTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree").finish_non_exhaustive()
    }
}

impl<S> CommandTree<S> {
    /// Builds and verifies the tree for one root command and its whole
    /// subcommand hierarchy.
    pub fn build(command: &Command<S>) -> Result<Self, RegistrationError> {
        let mut root = Node {
            kind: NodeKind::Literal {
                labels: command.labels(),
                permission: command.permission.clone(),
                open_suggestions: command.open_suggestions,
            },
            depth: 0,
            children: Vec::new(),
            terminal: None,
        };

        let mut all_flags = Vec::new();
        insert_command(
            &mut root,
            command,
            &[command.name.clone()],
            &[],
            &mut all_flags,
        )?;
        order_children(&mut root);

        Ok(Self {
            root,
            all_flags: Arc::new(FlagExtractor::from_parameters(all_flags.iter())),
        })
    }

    /// Every flag registered anywhere in the hierarchy. Used to keep
    /// flag tokens transparent while matching positions.
    pub fn all_flags(&self) -> &FlagExtractor<S> {
        &self.all_flags
    }

    /// Finds the usage matching the raw tokens (everything after the
    /// command label).
    ///
    /// Depth-first, literals before parameters; optional parameters may
    /// be skipped; a greedy parameter swallows the rest. When the tokens
    /// run out early the nearest usage is still selected so the pipeline
    /// can report the precise missing parameter.
    pub fn select(&self, raws: &[String], config: &EngineConfig) -> legate::Result<Terminal<S>> {
        let mask = flags::compute_mask(raws, config, &self.all_flags, None);

        let mut failure: Option<(&Node<S>, usize)> = None;
        if let Some(terminal) = resolve_node(&self.root, raws, &mask, 0, config, &mut failure) {
            return Ok(terminal.clone());
        }

        let (node, pos) = match failure {
            Some(failure) => failure,
            None => (&self.root, 0),
        };

        let pos = next_unmasked(raws, &mask, pos);
        if pos < raws.len() {
            let all_literals = !node.children.is_empty()
                && node
                    .children
                    .iter()
                    .all(|c| matches!(c.kind, NodeKind::Literal { .. }));
            if all_literals {
                return Err(Error::UnknownSubCommand(raws[pos].clone()));
            }
        }

        Err(Error::InvalidSyntax {
            usage: self.closest_format(node),
        })
    }

    fn closest_format(&self, node: &Node<S>) -> String {
        if let Some(terminal) = nearest_terminal(node) {
            return terminal.format();
        }
        if let Some(terminal) = nearest_terminal(&self.root) {
            return terminal.format();
        }
        match &self.root.kind {
            NodeKind::Literal { labels, .. } => labels[0].clone(),
            NodeKind::Param(param) => param.format(),
        }
    }

    /// The union of child node sets reachable at the completion cursor,
    /// in traversal order.
    pub(crate) fn completion_targets<'a>(
        &'a self,
        tokens: &[String],
        mask: &[bool],
        config: &EngineConfig,
    ) -> Vec<&'a Node<S>> {
        let mut targets = Vec::new();
        gather(&self.root, tokens, mask, 0, config, &mut targets);

        let mut seen = HashSet::new();
        targets.retain(|n| seen.insert(*n as *const Node<S>));
        targets
    }

    /// Renders the tree for debug logging, terminals marked with `*`.
    pub fn visualize(&self) -> String {
        let mut out = String::new();
        visualize_node(&self.root, 0, &mut out);
        out
    }
}

fn visualize_node<S>(node: &Node<S>, indent: usize, out: &mut String) {
    let label = match &node.kind {
        NodeKind::Literal { labels, .. } => labels[0].clone(),
        NodeKind::Param(param) => param.format(),
    };
    let marker = if node.terminal.is_some() { " *" } else { "" };
    let _ = writeln!(out, "{:indent$}{}{}", "", label, marker, indent = indent);

    for child in &node.children {
        visualize_node(child, indent + 2, out);
    }
}

fn insert_command<S>(
    node: &mut Node<S>,
    command: &Command<S>,
    path: &[String],
    prefix: &[Parameter<S>],
    all_flags: &mut Vec<Parameter<S>>,
) -> Result<(), RegistrationError> {
    let mut seen: Vec<Vec<Parameter<S>>> = Vec::new();

    for usage in &command.usages {
        let usage = Arc::new(usage.clone());

        // Canonicalize the usage's own positional steps, resolving
        // subcommand references against the actual children.
        let mut steps: Vec<Step<S>> = Vec::new();
        let mut sub_path: Vec<String> = Vec::new();
        let mut scope = command;
        for parameter in &usage.parameters {
            if parameter.is_flag() {
                continue;
            }

            if let ParameterKind::SubCommand { name, .. } = &parameter.kind {
                let child = scope
                    .find_sub(name, true)
                    .ok_or_else(|| RegistrationError::UnknownSubCommand(name.clone()))?;

                let mut canonical = parameter.clone();
                canonical.name = child.name.clone();
                canonical.kind = ParameterKind::SubCommand {
                    name: child.name.clone(),
                    aliases: child.aliases.iter().cloned().collect(),
                };

                steps.push(Step {
                    param: canonical,
                    literal: Some(LiteralMeta {
                        labels: child.labels(),
                        permission: child.permission.clone(),
                        open_suggestions: child.open_suggestions,
                    }),
                });
                sub_path.push(child.name.clone());
                scope = child;
            } else {
                steps.push(Step {
                    param: parameter.clone(),
                    literal: None,
                });
            }
        }

        let mut merged: Vec<Parameter<S>> = prefix.to_vec();
        merged.extend(steps.iter().map(|s| s.param.clone()));

        ambiguity::verify_sequence(&merged)?;
        for earlier in &seen {
            ambiguity::verify_distinct(earlier, &merged)?;
        }

        let extractor = Arc::new(FlagExtractor::from_parameters(usage.parameters.iter()));
        all_flags.extend(usage.parameters.iter().filter(|p| p.is_flag()).cloned());

        let mut terminal_path = path.to_vec();
        terminal_path.extend(sub_path);

        let terminal = Terminal {
            usage,
            parameters: Arc::new(merged.clone()),
            flags: extractor,
            path: terminal_path,
        };
        insert_steps(node, &steps, terminal)?;

        seen.push(merged);
    }

    for sub in &command.sub_commands {
        let index = get_or_create_literal(
            node,
            sub.labels(),
            sub.permission.clone(),
            sub.open_suggestions,
        )?;

        let mut sub_prefix = prefix.to_vec();
        sub_prefix.push(sub_command_parameter(sub));

        let mut sub_labels = path.to_vec();
        sub_labels.push(sub.name.clone());

        insert_command(
            &mut node.children[index],
            sub,
            &sub_labels,
            &sub_prefix,
            all_flags,
        )?;
    }

    Ok(())
}

fn sub_command_parameter<S>(command: &Command<S>) -> Parameter<S> {
    let mut parameter = Parameter::sub_command(&command.name);
    parameter.kind = ParameterKind::SubCommand {
        name: command.name.clone(),
        aliases: command.aliases.iter().cloned().collect(),
    };
    parameter
}

fn insert_steps<S>(
    node: &mut Node<S>,
    steps: &[Step<S>],
    terminal: Terminal<S>,
) -> Result<(), RegistrationError> {
    match steps.split_first() {
        None => {
            if let Some(existing) = &node.terminal {
                return Err(RegistrationError::AmbiguousUsages {
                    first: existing.format(),
                    second: terminal.format(),
                });
            }
            node.terminal = Some(terminal);
            Ok(())
        }
        Some((step, rest)) => {
            let index = match &step.literal {
                Some(meta) => get_or_create_literal(
                    node,
                    meta.labels.clone(),
                    meta.permission.clone(),
                    meta.open_suggestions,
                )?,
                None => get_or_create_param(node, &step.param),
            };
            insert_steps(&mut node.children[index], rest, terminal)
        }
    }
}

fn get_or_create_literal<S>(
    node: &mut Node<S>,
    labels: Vec<String>,
    permission: PermissionCondition,
    open_suggestions: bool,
) -> Result<usize, RegistrationError> {
    for (i, child) in node.children.iter().enumerate() {
        if let NodeKind::Literal {
            labels: existing, ..
        } = &child.kind
        {
            if existing[0].eq_ignore_ascii_case(&labels[0]) {
                return Ok(i);
            }
            // Alias overlap between distinct literals cannot be routed.
            if existing
                .iter()
                .any(|e| labels.iter().any(|l| l.eq_ignore_ascii_case(e)))
            {
                return Err(RegistrationError::DuplicateName(labels[0].clone()));
            }
        }
    }

    let depth = node.depth + 1;
    node.children.push(Node {
        kind: NodeKind::Literal {
            labels,
            permission,
            open_suggestions,
        },
        depth,
        children: Vec::new(),
        terminal: None,
    });
    Ok(node.children.len() - 1)
}

fn get_or_create_param<S>(node: &mut Node<S>, param: &Parameter<S>) -> usize {
    for (i, child) in node.children.iter().enumerate() {
        if let NodeKind::Param(existing) = &child.kind {
            if existing.name == param.name && existing.type_id() == param.type_id() {
                return i;
            }
        }
    }

    let depth = node.depth + 1;
    node.children.push(Node {
        kind: NodeKind::Param(param.clone()),
        depth,
        children: Vec::new(),
        terminal: None,
    });
    node.children.len() - 1
}

fn order_children<S>(node: &mut Node<S>) {
    // Literals before parameters; specific types before catch-alls.
    node.children.sort_by_key(|c| match &c.kind {
        NodeKind::Literal { .. } => (false, 0),
        NodeKind::Param(param) => (true, param.priority()),
    });
    for child in &mut node.children {
        order_children(child);
    }
}

pub(crate) fn next_unmasked(raws: &[String], mask: &[bool], mut pos: usize) -> usize {
    while pos < raws.len() && mask[pos] {
        pos += 1;
    }
    pos
}

fn resolve_node<'a, S>(
    node: &'a Node<S>,
    raws: &[String],
    mask: &[bool],
    pos: usize,
    config: &EngineConfig,
    failure: &mut Option<(&'a Node<S>, usize)>,
) -> Option<&'a Terminal<S>> {
    let pos = next_unmasked(raws, mask, pos);
    if pos >= raws.len() {
        let found = nearest_terminal(node);
        if found.is_none() {
            record_failure(failure, node, pos);
        }
        return found;
    }

    let token = &raws[pos];
    for child in &node.children {
        match &child.kind {
            NodeKind::Literal { labels, .. } => {
                if labels
                    .iter()
                    .any(|l| label_matches(l, token, config.ignore_case))
                {
                    if let Some(t) = resolve_node(child, raws, mask, pos + 1, config, failure) {
                        return Some(t);
                    }
                }
            }
            NodeKind::Param(param) => {
                if param.greedy {
                    if let Some(t) = &child.terminal {
                        return Some(t);
                    }
                    continue;
                }
                if param.matches_input(token, config.ignore_case) {
                    if let Some(t) = resolve_node(child, raws, mask, pos + 1, config, failure) {
                        return Some(t);
                    }
                }
                if param.optional {
                    // Skip the optional: offer the token to its children.
                    if let Some(t) = resolve_node(child, raws, mask, pos, config, failure) {
                        return Some(t);
                    }
                }
            }
        }
    }

    // A lone required parameter child still selects its path even when
    // the token fails its type, so the pipeline reports the parse error
    // instead of a generic syntax failure.
    if node.children.len() == 1 {
        if let NodeKind::Param(param) = &node.children[0].kind {
            if param.is_required()
                && !param.greedy
                && !param.matches_input(token, config.ignore_case)
            {
                if let Some(t) =
                    resolve_node(&node.children[0], raws, mask, pos + 1, config, failure)
                {
                    return Some(t);
                }
            }
        }
    }

    record_failure(failure, node, pos);
    None
}

fn record_failure<'a, S>(
    failure: &mut Option<(&'a Node<S>, usize)>,
    node: &'a Node<S>,
    pos: usize,
) {
    if failure.map_or(true, |(_, recorded)| pos >= recorded) {
        *failure = Some((node, pos));
    }
}

/// The closest terminal reachable from a node: fewest missing required
/// steps first, then shallowest.
fn nearest_terminal<S>(node: &Node<S>) -> Option<&Terminal<S>> {
    let mut best: Option<(usize, usize, &Terminal<S>)> = None;
    collect_terminals(node, 0, 0, &mut best);
    best.map(|(_, _, terminal)| terminal)
}

fn collect_terminals<'a, S>(
    node: &'a Node<S>,
    depth: usize,
    missing: usize,
    best: &mut Option<(usize, usize, &'a Terminal<S>)>,
) {
    if let Some(terminal) = &node.terminal {
        if best.map_or(true, |(m, d, _)| (missing, depth) < (m, d)) {
            *best = Some((missing, depth, terminal));
        }
    }

    for child in &node.children {
        let required = match &child.kind {
            NodeKind::Literal { .. } => 1,
            NodeKind::Param(param) => usize::from(param.is_required()),
        };
        collect_terminals(child, depth + 1, missing + required, best);
    }
}

fn gather<'a, S>(
    node: &'a Node<S>,
    tokens: &[String],
    mask: &[bool],
    pos: usize,
    config: &EngineConfig,
    out: &mut Vec<&'a Node<S>>,
) {
    let pos = next_unmasked(tokens, mask, pos);
    if pos >= tokens.len() {
        out.extend(node.children.iter());
        return;
    }

    let token = &tokens[pos];
    for child in &node.children {
        match &child.kind {
            NodeKind::Literal { labels, .. } => {
                if labels
                    .iter()
                    .any(|l| label_matches(l, token, config.ignore_case))
                {
                    gather(child, tokens, mask, pos + 1, config, out);
                }
            }
            NodeKind::Param(param) => {
                if param.greedy {
                    // A greedy parameter spans every later position.
                    out.push(child);
                    continue;
                }
                if param.matches_input(token, config.ignore_case) {
                    gather(child, tokens, mask, pos + 1, config, out);
                }
                if param.optional {
                    gather(child, tokens, mask, pos, config, out);
                }
            }
        }
    }
}
