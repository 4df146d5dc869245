//! Materialized secret-namespace trees
//!
//! This module implements the parallel exploration of a remote secret
//! namespace and the in-memory tree it produces.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       TreeBuilder        │
//!                     │  - classifies the root   │
//!                     │  - seeds one work order  │
//!                     │  - collects N signals    │
//!                     └───────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │ list/read │             │ list/read │             │ list/read │
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       │                         │                         │
//!       └─────────────────────────┼─────────────────────────┘
//!                                 ▼
//!                   ┌──────────────────────────┐
//!                   │        WorkQueue         │
//!                   │  self-terminating FIFO   │
//!                   │  (workers are also the   │
//!                   │   only producers)        │
//!                   └──────────────────────────┘
//! ```
//!
//! The [`Tree`] value itself is plain data: a labelled node with a kind tag,
//! a value (for key leaves) and an ordered child list. Everything here other
//! than `render` is part of the correctness surface.

pub mod builder;
pub mod queue;

pub use builder::{build_tree, TreeBuilder, WorkOrder};
pub use queue::{OpKind, WorkQueue};

use crate::path::trim_trailing_slash;
use console::Style;

/// Classification of a node in the secret namespace
///
/// The remote never states what a path is; the kind is inferred from which
/// of the two probes (`read`, `list`) answers for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The synthetic node above all mount points
    Root,
    /// A namespace node: `list` succeeds, `read` is NotFound
    Dir,
    /// A leaf secret: `read` succeeds, `list` is NotFound
    Secret,
    /// Both probes succeed; the remote allows a secret at a path that is
    /// also a prefix of other paths
    DirAndSecret,
    /// A single field of a secret, materialized only when key fetching is on
    Key,
}

impl NodeKind {
    /// True for kinds whose `name` carries a trailing `/`
    pub fn is_namespace(self) -> bool {
        matches!(self, NodeKind::Dir | NodeKind::DirAndSecret)
    }
}

/// One node of a materialized namespace tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Full canonical path of the node; `Dir`/`DirAndSecret` end with `/`,
    /// `Key` nodes have the form `<secret-path>:<field>`
    pub name: String,

    /// Inferred node kind
    pub kind: NodeKind,

    /// Field value for `Key` nodes, empty otherwise
    pub value: String,

    /// Children in discovery order
    pub children: Vec<Tree>,
}

impl Tree {
    /// Create a node with no children and no value
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: String::new(),
            children: Vec::new(),
        }
    }

    /// Create the synthetic root node
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Root)
    }

    /// Create a key leaf carrying one field value
    pub fn key(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Key,
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Last path segment of the node name
    ///
    /// `/` is re-appended for namespace kinds, `:` prepended for keys, and
    /// the root renders as `/`.
    pub fn basename(&self) -> String {
        match self.kind {
            NodeKind::Root => "/".to_string(),
            NodeKind::Key => {
                let field = self.name.rsplit(':').next().unwrap_or(&self.name);
                format!(":{field}")
            }
            NodeKind::Dir | NodeKind::DirAndSecret => {
                let trimmed = trim_trailing_slash(&self.name);
                let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
                format!("{segment}/")
            }
            NodeKind::Secret => self
                .name
                .rsplit('/')
                .next()
                .unwrap_or(&self.name)
                .to_string(),
        }
    }

    /// Apply `f` to every node strictly below this one, pre-order
    pub fn walk<F: FnMut(&Tree)>(&self, mut f: F) {
        fn inner<F: FnMut(&Tree)>(node: &Tree, f: &mut F) {
            for child in &node.children {
                f(child);
                inner(child, f);
            }
        }
        inner(self, &mut f);
    }

    /// Enumerate the names of all leaves (nodes with no children), pre-order
    ///
    /// Key names are included when keys were fetched. A childless root
    /// enumerates as itself.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.children.is_empty() {
            out.push(self.name.clone());
            return out;
        }
        self.walk(|node| {
            if node.children.is_empty() {
                out.push(node.name.clone());
            }
        });
        out
    }

    /// Count of nodes strictly below this one
    pub fn len(&self) -> usize {
        let mut n = 0;
        self.walk(|_| n += 1);
        n
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Draw the tree as indented ASCII art
    ///
    /// Terminal `Secret` nodes are omitted unless `show_keys` is set; key
    /// leaves disappear with their parent. Colour uses ANSI escapes and is
    /// purely decorative.
    pub fn render(&self, colour: bool, show_keys: bool) -> String {
        let mut out = String::new();
        out.push_str(&paint(self, colour));
        out.push('\n');
        render_children(self, "", colour, show_keys, &mut out);
        out
    }
}

fn visible<'a>(node: &'a Tree, show_keys: bool) -> Vec<&'a Tree> {
    node.children
        .iter()
        .filter(|c| show_keys || c.kind != NodeKind::Secret || !c.children.is_empty())
        .collect()
}

fn render_children(node: &Tree, prefix: &str, colour: bool, show_keys: bool, out: &mut String) {
    let children = visible(node, show_keys);
    let last = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
        let (branch, pad) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&paint(child, colour));
        out.push('\n');
        render_children(child, &format!("{prefix}{pad}"), colour, show_keys, out);
    }
}

fn paint(node: &Tree, colour: bool) -> String {
    let label = node.basename();
    if !colour {
        return label;
    }
    let style = match node.kind {
        NodeKind::Root | NodeKind::Dir => Style::new().blue().bold(),
        NodeKind::DirAndSecret => Style::new().magenta().bold(),
        NodeKind::Secret => Style::new().green(),
        NodeKind::Key => Style::new().yellow(),
    };
    style
        .force_styling(true)
        .apply_to(label)
        .to_string()
}
