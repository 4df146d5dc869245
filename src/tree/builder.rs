//! Parallel tree builder
//!
//! Materializes an arbitrary subtree of the remote namespace into a [`Tree`].
//! The remote only exposes per-node listing, so the shape of the work is
//! discovered as it runs: every executed order may discover children that
//! need orders of their own. A small fixed pool of workers drains the
//! self-terminating [`WorkQueue`]; each worker both consumes orders and
//! produces follow-ups.
//!
//! Ownership during the build: every parent has exactly one order, and that
//! order's worker is the only writer of the parent's child list. Once
//! [`TreeBuilder::build`] returns, the tree is plain immutable data.

use crate::client::{MountKind, SecretStore};
use crate::error::{BuildError, StoreError, StoreResult};
use crate::path::{canonicalize, trim_trailing_slash};
use crate::tree::queue::{OpKind, WorkQueue};
use crate::tree::{NodeKind, Tree};
use crossbeam_channel::bounded;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, trace, warn};

/// Ceiling for the derived worker count. Remote calls dominate wall time and
/// the remote is typically rate-limited; more than three concurrent callers
/// rarely helps. A policy knob, not a correctness bound.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// A node still under construction
///
/// Only the child list needs synchronization: exactly one worker writes it
/// (the one executing this node's order), but that worker runs on its own
/// thread.
struct SharedNode {
    name: String,
    kind: NodeKind,
    value: String,
    children: Mutex<Vec<NodeRef>>,
}

type NodeRef = Arc<SharedNode>;

impl SharedNode {
    fn new(name: String, kind: NodeKind) -> NodeRef {
        Arc::new(Self {
            name,
            kind,
            value: String::new(),
            children: Mutex::new(Vec::new()),
        })
    }

    fn key(name: String, value: String) -> NodeRef {
        Arc::new(Self {
            name,
            kind: NodeKind::Key,
            value,
            children: Mutex::new(Vec::new()),
        })
    }

    /// Convert the finished construction graph into plain tree data
    fn freeze(&self) -> Tree {
        let children = self.children.lock().expect("node mutex poisoned");
        Tree {
            name: self.name.clone(),
            kind: self.kind,
            value: self.value.clone(),
            children: children.iter().map(|c| c.freeze()).collect(),
        }
    }
}

/// One unit of exploration: fetch `op` for `path` and append whatever is
/// discovered under `target`
pub struct WorkOrder {
    target: NodeRef,
    path: String,
    op: OpKind,
}

/// Builds a materialized tree from a remote store
pub struct TreeBuilder<'a> {
    store: &'a dyn SecretStore,
    workers: usize,
    fetch_keys: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self {
            store,
            workers: default_workers(),
            fetch_keys: false,
        }
    }

    /// Override the worker count (floored at 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Also materialize each secret's fields as key leaves
    pub fn fetch_keys(mut self, fetch_keys: bool) -> Self {
        self.fetch_keys = fetch_keys;
        self
    }

    /// Explore the subtree rooted at `path`
    ///
    /// On a transport error the first one observed is returned, wrapped with
    /// whatever part of the tree had been populated by then. NotFound during
    /// worker steps is absorbed as "no children here"; a node can vanish
    /// between the call that discovered it and the call that explores it.
    pub fn build(&self, path: &str) -> Result<Tree, BuildError> {
        let canonical = canonicalize(path);

        let kind = match self.classify_root(&canonical) {
            Ok(kind) => kind,
            Err(source) => {
                // Nothing was explored; hand back a bare placeholder node.
                let partial = Tree::new(format!("{canonical}/"), NodeKind::Dir);
                return Err(BuildError { source, partial });
            }
        };

        let name = root_name(&canonical, kind);
        let root = SharedNode::new(name.clone(), kind);

        let queue = WorkQueue::new(self.workers);
        queue.push(WorkOrder {
            target: Arc::clone(&root),
            path: name,
            op: OpKind::for_node(kind, self.fetch_keys),
        });

        // Buffered to the pool size so a finishing worker never blocks.
        let (done_tx, done_rx) = bounded::<Option<StoreError>>(self.workers);

        debug!(
            root = %root.name,
            workers = self.workers,
            fetch_keys = self.fetch_keys,
            "starting tree build"
        );

        let mut first_error: Option<StoreError> = None;
        thread::scope(|scope| {
            for id in 0..self.workers {
                let done = done_tx.clone();
                let queue = &queue;
                let store = self.store;
                let fetch_keys = self.fetch_keys;
                thread::Builder::new()
                    .name(format!("tree-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        worker_loop(id, store, queue, fetch_keys, done)
                    })
                    .expect("failed to spawn tree worker");
            }

            // Exactly one completion signal per worker; the first error wins.
            for _ in 0..self.workers {
                if let Ok(Some(err)) = done_rx.recv() {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        });

        let tree = root.freeze();
        debug!(root = %tree.name, nodes = tree.len(), "tree build finished");

        match first_error {
            None => Ok(tree),
            Some(source) => Err(BuildError {
                source,
                partial: tree,
            }),
        }
    }

    /// Infer the root's kind by probing the remote
    ///
    /// `read` NotFound means the path can only be a namespace; a readable
    /// path is then probed with `list` to tell a plain secret from one that
    /// doubles as a namespace.
    fn classify_root(&self, canonical: &str) -> StoreResult<NodeKind> {
        if canonical.is_empty() {
            return Ok(NodeKind::Root);
        }
        match self.store.read(canonical)? {
            None => Ok(NodeKind::Dir),
            Some(_) => match self.store.list(canonical)? {
                Some(_) => Ok(NodeKind::DirAndSecret),
                None => Ok(NodeKind::Secret),
            },
        }
    }
}

/// One-call convenience wrapper over [`TreeBuilder`]
pub fn build_tree(
    store: &dyn SecretStore,
    path: &str,
    fetch_keys: bool,
) -> Result<Tree, BuildError> {
    TreeBuilder::new(store).fetch_keys(fetch_keys).build(path)
}

fn default_workers() -> usize {
    num_cpus::get().clamp(1, DEFAULT_MAX_WORKERS)
}

/// The display name of the root node
///
/// Namespace roots carry the `/` suffix; the empty canonical path is the
/// synthetic root marker.
fn root_name(canonical: &str, kind: NodeKind) -> String {
    if canonical.is_empty() {
        return "/".to_string();
    }
    if kind.is_namespace() {
        format!("{}/", trim_trailing_slash(canonical))
    } else {
        canonical.to_string()
    }
}

/// Worker body: pop, execute, append, push follow-ups, repeat
///
/// On a remote failure the worker closes the queue, publishes the error, and
/// performs one more pop so the queue's awake accounting stays balanced
/// before exiting. The remaining workers observe the closed queue on their
/// next pop and exit with a nil signal.
fn worker_loop(
    id: usize,
    store: &dyn SecretStore,
    queue: &WorkQueue<WorkOrder>,
    fetch_keys: bool,
    done: crossbeam_channel::Sender<Option<StoreError>>,
) {
    loop {
        let Some(order) = queue.pop() else {
            trace!(worker = id, "queue closed, exiting");
            let _ = done.send(None);
            return;
        };

        trace!(worker = id, path = %order.path, op = ?order.op, "executing order");
        if let Err(err) = execute_order(store, queue, &order, fetch_keys) {
            warn!(worker = id, path = %order.path, error = %err, "remote call failed, unwinding");
            queue.close();
            let _ = done.send(Some(err));
            let _ = queue.pop();
            return;
        }
    }
}

/// Execute one order: remote call(s), append discoveries, push follow-ups
fn execute_order(
    store: &dyn SecretStore,
    queue: &WorkQueue<WorkOrder>,
    order: &WorkOrder,
    fetch_keys: bool,
) -> StoreResult<()> {
    let mut discovered: Vec<NodeRef> = Vec::new();

    match order.op {
        OpKind::None => {}
        OpKind::List => list_children(store, &order.path, &mut discovered)?,
        OpKind::Get => read_keys(store, &order.path, &mut discovered)?,
        OpKind::ListAndGet => {
            // Keys first, then namespace children; the concatenation order
            // at a DirAndSecret node is part of the contract.
            read_keys(store, &order.path, &mut discovered)?;
            list_children(store, &order.path, &mut discovered)?;
        }
        OpKind::Mounts => list_mounts(store, &mut discovered)?,
    }

    {
        let mut children = order.target.children.lock().expect("node mutex poisoned");
        children.extend(discovered.iter().cloned());
    }

    for child in discovered {
        let op = OpKind::for_node(child.kind, fetch_keys);
        if op != OpKind::None {
            queue.push(WorkOrder {
                path: child.name.clone(),
                target: child,
                op,
            });
        }
    }

    Ok(())
}

/// Append one node per listed child; a trailing `/` on the relative name
/// marks a sub-namespace, its absence a secret
fn list_children(store: &dyn SecretStore, path: &str, out: &mut Vec<NodeRef>) -> StoreResult<()> {
    let base = trim_trailing_slash(path);
    let Some(children) = store.list(base)? else {
        // Deleted (or never a namespace) between discovery and exploration.
        trace!(path = %base, "list returned nothing, absorbing");
        return Ok(());
    };
    for child in children {
        let kind = if child.ends_with('/') {
            NodeKind::Dir
        } else {
            NodeKind::Secret
        };
        out.push(SharedNode::new(format!("{base}/{child}"), kind));
    }
    Ok(())
}

/// Append one key leaf per secret field, in the remote's insertion order
fn read_keys(store: &dyn SecretStore, path: &str, out: &mut Vec<NodeRef>) -> StoreResult<()> {
    let base = trim_trailing_slash(path);
    let Some(secret) = store.read(base)? else {
        trace!(path = %base, "read returned nothing, absorbing");
        return Ok(());
    };
    for (field, value) in secret.iter() {
        out.push(SharedNode::key(
            format!("{base}:{field}"),
            value.to_string(),
        ));
    }
    Ok(())
}

/// Append one namespace node per mount, kv mounts first
///
/// A mount reported under both kinds is emitted once (first occurrence wins)
/// so the walk does not explore the same subtree twice.
fn list_mounts(store: &dyn SecretStore, out: &mut Vec<NodeRef>) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for kind in [MountKind::Kv, MountKind::Generic] {
        for mount in store.mounts(kind)? {
            let trimmed = trim_trailing_slash(&mount).to_string();
            if seen.insert(trimmed.clone()) {
                out.push(SharedNode::new(format!("{trimmed}/"), NodeKind::Dir));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Secret;
    use std::collections::HashMap;

    /// Minimal deterministic store for unit tests; the integration suite
    /// has a richer fake with scripted failures.
    #[derive(Default)]
    struct MapStore {
        secrets: HashMap<String, Secret>,
        listings: HashMap<String, Vec<String>>,
        kv_mounts: Vec<String>,
        generic_mounts: Vec<String>,
    }

    impl MapStore {
        fn with_secret(mut self, path: &str, fields: &[(&str, &str)]) -> Self {
            let mut secret = Secret::new();
            for (k, v) in fields {
                secret.insert(*k, *v);
            }
            self.secrets.insert(path.to_string(), secret);
            self
        }

        fn with_listing(mut self, path: &str, children: &[&str]) -> Self {
            self.listings.insert(
                path.to_string(),
                children.iter().map(|c| c.to_string()).collect(),
            );
            self
        }
    }

    impl SecretStore for MapStore {
        fn read(&self, path: &str) -> StoreResult<Option<Secret>> {
            Ok(self.secrets.get(path).cloned())
        }

        fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
            Ok(self.listings.get(path).cloned())
        }

        fn mounts(&self, kind: MountKind) -> StoreResult<Vec<String>> {
            Ok(match kind {
                MountKind::Kv => self.kv_mounts.clone(),
                MountKind::Generic => self.generic_mounts.clone(),
            })
        }

        fn write(&self, _path: &str, _secret: &Secret) -> StoreResult<()> {
            unimplemented!("not used by the builder")
        }

        fn delete(&self, _path: &str) -> StoreResult<()> {
            unimplemented!("not used by the builder")
        }
    }

    #[test]
    fn test_classify_root_dir() {
        let store = MapStore::default().with_listing("secret", &["a"]);
        let builder = TreeBuilder::new(&store);
        assert_eq!(builder.classify_root("secret").unwrap(), NodeKind::Dir);
    }

    #[test]
    fn test_classify_root_secret() {
        let store = MapStore::default().with_secret("secret/foo", &[("a", "1")]);
        let builder = TreeBuilder::new(&store);
        assert_eq!(
            builder.classify_root("secret/foo").unwrap(),
            NodeKind::Secret
        );
    }

    #[test]
    fn test_classify_root_dir_and_secret() {
        let store = MapStore::default()
            .with_secret("secret/x", &[("k", "v")])
            .with_listing("secret/x", &["child"]);
        let builder = TreeBuilder::new(&store);
        assert_eq!(
            builder.classify_root("secret/x").unwrap(),
            NodeKind::DirAndSecret
        );
    }

    #[test]
    fn test_classify_empty_path_is_root() {
        let store = MapStore::default();
        let builder = TreeBuilder::new(&store);
        assert_eq!(builder.classify_root("").unwrap(), NodeKind::Root);
    }

    #[test]
    fn test_build_single_secret_with_keys() {
        let store =
            MapStore::default().with_secret("secret/foo", &[("a", "1"), ("b", "2")]);
        let tree = build_tree(&store, "secret/foo", true).unwrap();

        assert_eq!(tree.kind, NodeKind::Secret);
        assert_eq!(tree.name, "secret/foo");
        let names: Vec<_> = tree.children.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["secret/foo:a", "secret/foo:b"]);
        let values: Vec<_> = tree.children.iter().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_build_without_keys_leaves_secret_bare() {
        let store = MapStore::default().with_secret("secret/foo", &[("a", "1")]);
        let tree = build_tree(&store, "secret/foo", false).unwrap();
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_dir_root_gets_slash_suffix() {
        let store = MapStore::default().with_listing("secret", &["foo"]);
        let tree = build_tree(&store, "/secret/", false).unwrap();
        assert_eq!(tree.name, "secret/");
        assert_eq!(tree.kind, NodeKind::Dir);
        assert_eq!(tree.children[0].name, "secret/foo");
        assert_eq!(tree.children[0].kind, NodeKind::Secret);
    }

    #[test]
    fn test_mounts_deduplicated() {
        let store = MapStore {
            kv_mounts: vec!["secret/".into(), "kv2/".into()],
            generic_mounts: vec!["secret/".into(), "cubbyhole/".into()],
            ..MapStore::default()
        };
        let tree = build_tree(&store, "/", false).unwrap();
        let names: Vec<_> = tree.children.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["secret/", "kv2/", "cubbyhole/"]);
    }

    #[test]
    fn test_classification_error_propagates_immediately() {
        struct FailingStore;
        impl SecretStore for FailingStore {
            fn read(&self, path: &str) -> StoreResult<Option<Secret>> {
                Err(StoreError::Transport {
                    path: path.to_string(),
                    reason: "connection refused".into(),
                })
            }
            fn list(&self, _: &str) -> StoreResult<Option<Vec<String>>> {
                Ok(None)
            }
            fn mounts(&self, _: MountKind) -> StoreResult<Vec<String>> {
                Ok(Vec::new())
            }
            fn write(&self, _: &str, _: &Secret) -> StoreResult<()> {
                Ok(())
            }
            fn delete(&self, _: &str) -> StoreResult<()> {
                Ok(())
            }
        }

        let err = build_tree(&FailingStore, "secret/foo", false).unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(err.partial.children.is_empty());
    }
}
