//! Integration tests for vaultctl
//!
//! These drive the tree builder end-to-end against an in-memory fake store,
//! so no live server is needed. Scripted failures are keyed by path, which
//! keeps the fake deterministic under any worker interleaving.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use vaultctl::error::{StoreError, StoreResult};
use vaultctl::path::trim_trailing_slash;
use vaultctl::{build_tree, MountKind, NodeKind, Secret, SecretStore, Tree, TreeBuilder};

/// In-memory secret store with scripted listings and failures
#[derive(Default)]
struct FakeStore {
    secrets: HashMap<String, Secret>,
    listings: HashMap<String, Vec<String>>,
    kv_mounts: Vec<String>,
    generic_mounts: Vec<String>,
    /// Paths whose `list` fails with a transport error
    fail_list: HashSet<String>,
    calls: AtomicU64,
}

impl FakeStore {
    fn secret(mut self, path: &str, fields: &[(&str, &str)]) -> Self {
        let mut secret = Secret::new();
        for (k, v) in fields {
            secret.insert(*k, *v);
        }
        self.secrets.insert(path.to_string(), secret);
        self
    }

    fn listing(mut self, path: &str, children: &[&str]) -> Self {
        self.listings.insert(
            path.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    fn kv_mount(mut self, name: &str) -> Self {
        self.kv_mounts.push(name.to_string());
        self
    }

    fn generic_mount(mut self, name: &str) -> Self {
        self.generic_mounts.push(name.to_string());
        self
    }

    fn failing_list(mut self, path: &str) -> Self {
        self.fail_list.insert(path.to_string());
        self
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SecretStore for FakeStore {
    fn read(&self, path: &str) -> StoreResult<Option<Secret>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.secrets.get(path).cloned())
    }

    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_list.contains(path) {
            return Err(StoreError::Transport {
                path: path.to_string(),
                reason: "connection reset by peer".to_string(),
            });
        }
        Ok(self.listings.get(path).cloned())
    }

    fn mounts(&self, kind: MountKind) -> StoreResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(match kind {
            MountKind::Kv => self.kv_mounts.clone(),
            MountKind::Generic => self.generic_mounts.clone(),
        })
    }

    fn write(&self, path: &str, _secret: &Secret) -> StoreResult<()> {
        Err(StoreError::Api {
            path: path.to_string(),
            status: 405,
            message: "fake store is read-only".to_string(),
        })
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        Err(StoreError::Api {
            path: path.to_string(),
            status: 405,
            message: "fake store is read-only".to_string(),
        })
    }
}

/// Check the structural invariants every returned tree must satisfy
fn assert_tree_invariants(tree: &Tree) {
    fn check(parent: &Tree) {
        let base = trim_trailing_slash(&parent.name);
        for child in &parent.children {
            if parent.kind != NodeKind::Root {
                assert!(
                    child.name.starts_with(base),
                    "child '{}' does not extend parent '{}'",
                    child.name,
                    parent.name
                );
                assert!(child.name.len() > parent.name.trim_end_matches('/').len());
            }
            match child.kind {
                NodeKind::Dir | NodeKind::DirAndSecret => {
                    assert!(child.name.ends_with('/'), "namespace '{}' lacks /", child.name)
                }
                NodeKind::Key => {
                    assert!(child.name.contains(':'));
                    assert!(child.children.is_empty());
                }
                _ => {}
            }
            check(child);
        }
    }
    check(tree);
}

#[test]
fn test_empty_namespace() {
    // Scenario 1: one kv mount whose listing is NotFound.
    let store = FakeStore::default().kv_mount("secret/");
    let tree = build_tree(&store, "/", false).unwrap();

    assert_eq!(tree.name, "/");
    assert_eq!(tree.kind, NodeKind::Root);
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].name, "secret/");
    assert_eq!(tree.children[0].kind, NodeKind::Dir);
    assert!(tree.children[0].children.is_empty());
    assert_eq!(tree.paths(), vec!["secret/".to_string()]);
    assert_tree_invariants(&tree);
}

#[test]
fn test_single_secret_with_keys() {
    // Scenario 2: root is a plain secret; keys come back in insertion order.
    let store = FakeStore::default().secret("secret/foo", &[("a", "1"), ("b", "2")]);
    let tree = build_tree(&store, "secret/foo", true).unwrap();

    assert_eq!(tree.kind, NodeKind::Secret);
    let children: Vec<_> = tree
        .children
        .iter()
        .map(|c| (c.name.as_str(), c.kind, c.value.as_str()))
        .collect();
    assert_eq!(
        children,
        vec![
            ("secret/foo:a", NodeKind::Key, "1"),
            ("secret/foo:b", NodeKind::Key, "2"),
        ]
    );
    assert_tree_invariants(&tree);
}

#[test]
fn test_dir_and_secret_orders_keys_first() {
    // Scenario 3: the root is both a secret and a namespace. Its listed
    // child has no trailing slash, so it classifies as a secret leaf.
    let store = FakeStore::default()
        .secret("secret/x", &[("k", "v")])
        .listing("secret/x", &["child"]);
    let tree = build_tree(&store, "secret/x", true).unwrap();

    assert_eq!(tree.kind, NodeKind::DirAndSecret);
    assert_eq!(tree.name, "secret/x/");
    let children: Vec<_> = tree
        .children
        .iter()
        .map(|c| (c.name.as_str(), c.kind))
        .collect();
    assert_eq!(
        children,
        vec![
            ("secret/x:k", NodeKind::Key),
            ("secret/x/child", NodeKind::Secret),
        ]
    );

    let paths = tree.paths();
    assert!(paths.contains(&"secret/x:k".to_string()));
    assert!(paths.contains(&"secret/x/child".to_string()));
    assert_tree_invariants(&tree);
}

#[test]
fn test_concurrent_deletion_race_is_absorbed() {
    // Scenario 4: a listed sub-namespace vanishes before its own listing.
    let store = FakeStore::default()
        .listing("secret", &["a/", "b/"])
        .listing("secret/b", &[]);
    let tree = build_tree(&store, "secret/", false).unwrap();

    assert_eq!(tree.kind, NodeKind::Dir);
    let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["secret/a/", "secret/b/"]);
    assert!(tree.children.iter().all(|c| c.children.is_empty()));
    assert_tree_invariants(&tree);
}

#[test]
fn test_transport_error_mid_traversal() {
    // Scenario 5: the first list succeeds, the next fails. The error comes
    // back verbatim with a prefix-consistent partial tree.
    let store = FakeStore::default()
        .listing("secret", &["a/"])
        .failing_list("secret/a");
    let err = build_tree(&store, "secret/", false).unwrap_err();

    assert!(err.to_string().contains("connection reset by peer"));
    assert_eq!(err.partial.name, "secret/");
    assert_tree_invariants(&err.partial);
}

#[test]
fn test_error_returns_partial_tree() {
    // Work discovered before the failure stays reachable in the partial
    // tree; the failing branch just has no children.
    let store = FakeStore::default()
        .listing("secret", &["ok/", "bad/"])
        .listing("secret/ok", &["leaf"])
        .failing_list("secret/bad");
    let err = TreeBuilder::new(&store)
        .workers(1)
        .build("secret/")
        .unwrap_err();

    let names: Vec<_> = err
        .partial
        .children
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["secret/ok/", "secret/bad/"]);
    assert_tree_invariants(&err.partial);
}

#[test]
fn test_mounts_concatenate_kv_then_generic() {
    let store = FakeStore::default()
        .kv_mount("kv-a/")
        .kv_mount("kv-b/")
        .generic_mount("secret/");
    let tree = build_tree(&store, "/", false).unwrap();
    let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["kv-a/", "kv-b/", "secret/"]);
}

/// Build a synthetic namespace with the given fan-out per directory level.
/// Directories at the last level list secrets instead of sub-namespaces.
fn wide_store(fan_out: usize, depth: usize) -> FakeStore {
    let mut store = FakeStore::default();
    let mut frontier = vec!["secret".to_string()];
    for level in 0..depth {
        let mut next = Vec::new();
        for dir in &frontier {
            let children: Vec<String> = (0..fan_out)
                .map(|i| {
                    if level + 1 < depth {
                        format!("d{i}/")
                    } else {
                        format!("s{i}")
                    }
                })
                .collect();
            store.listings.insert(
                dir.clone(),
                children.clone(),
            );
            if level + 1 < depth {
                for child in &children {
                    next.push(format!("{dir}/{}", child.trim_end_matches('/')));
                }
            }
        }
        frontier = next;
    }
    store
}

#[test]
fn test_self_termination_stress() {
    // Scenario 6: fan-out 10 at depth 4 is ~11k nodes. The pool must wind
    // down on its own with the whole tree materialized.
    let store = wide_store(10, 4);
    let tree = TreeBuilder::new(&store).workers(4).build("secret/").unwrap();

    // 10 + 100 + 1000 dirs, 10000 secret leaves below the root.
    assert_eq!(tree.len(), 11_110);
    assert_eq!(tree.paths().len(), 10_000);
    assert_tree_invariants(&tree);
    // One classification read plus one list per directory.
    assert_eq!(store.call_count(), 1 + 1 + 10 + 100 + 1000);
}

#[test]
fn test_worker_count_does_not_change_result() {
    // Same store, N=1 vs N=3: identical path sets and identical structure
    // up to sibling discovery order.
    let store = wide_store(5, 3)
        .secret("secret/d0/d1/s2", &[("k", "v")]);

    let one = TreeBuilder::new(&store)
        .workers(1)
        .fetch_keys(true)
        .build("secret/")
        .unwrap();
    let three = TreeBuilder::new(&store)
        .workers(3)
        .fetch_keys(true)
        .build("secret/")
        .unwrap();

    let mut paths_one = one.paths();
    let mut paths_three = three.paths();
    paths_one.sort();
    paths_three.sort();
    assert_eq!(paths_one, paths_three);
    assert_eq!(one.len(), three.len());
    assert!(paths_one.contains(&"secret/d0/d1/s2:k".to_string()));
}

#[test]
fn test_paths_set_is_deterministic() {
    let store = wide_store(4, 2);
    let mut runs: Vec<Vec<String>> = Vec::new();
    for _ in 0..3 {
        let tree = TreeBuilder::new(&store).workers(3).build("secret/").unwrap();
        let mut paths = tree.paths();
        paths.sort();
        runs.push(paths);
    }
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[test]
fn test_render_of_built_tree_uses_basenames() {
    let store = FakeStore::default()
        .listing("secret", &["app/"])
        .listing("secret/app", &["db"]);
    let tree = build_tree(&store, "secret/", false).unwrap();
    let rendered = tree.render(false, true);

    assert!(rendered.contains("secret/"));
    assert!(rendered.contains("app/"));
    assert!(rendered.contains("db"));
    // Children are indented under their parent.
    let app_line = rendered.lines().find(|l| l.contains("app/")).unwrap();
    let db_line = rendered.lines().find(|l| l.ends_with("db")).unwrap();
    assert!(db_line.find("db").unwrap() > app_line.find("app/").unwrap());
}
