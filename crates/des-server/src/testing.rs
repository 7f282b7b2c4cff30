//! In-memory collaborators for exercising the engines without a cluster
//!
//! Compiled for unit tests and behind the `testing` feature, which the
//! integration tests under `tests/` enable. Nothing here touches the network
//! or spawns a process.

use async_trait::async_trait;
use des_common::types::S3Credentials;
use des_common::DesError;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hadoop::{HadoopFs, HdfsEntry};
use crate::process::{CapturedRun, Invocation, ProcessRunner};
use crate::storage::{ObjectEntry, ObjectStore, ObjectStoreFactory};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Process runner
// ============================================================================

type Responder = Box<dyn FnMut(&Invocation) -> Result<CapturedRun, DesError> + Send>;

struct Rule {
    pattern: String,
    responder: Responder,
}

/// A [`ProcessRunner`] answering from a script of rules.
///
/// The first rule whose pattern occurs in the full command line answers.
/// Every invocation is recorded, matched or not.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching commands with a computed result.
    pub fn on<F>(self, pattern: impl Into<String>, responder: F) -> Self
    where
        F: FnMut(&Invocation) -> Result<CapturedRun, DesError> + Send + 'static,
    {
        lock(&self.rules).push(Rule {
            pattern: pattern.into(),
            responder: Box::new(responder),
        });
        self
    }

    /// Answer matching commands with the same output every time.
    pub fn reply(self, pattern: impl Into<String>, run: CapturedRun) -> Self {
        self.on(pattern, move |_| Ok(run.clone()))
    }

    /// Answer matching commands with `runs` in order, repeating the last one.
    pub fn replies(self, pattern: impl Into<String>, runs: Vec<CapturedRun>) -> Self {
        let mut runs: VecDeque<CapturedRun> = runs.into();
        self.on(pattern, move |_| {
            let run = if runs.len() > 1 {
                runs.pop_front()
            } else {
                runs.front().cloned()
            };
            Ok(run.unwrap_or_default())
        })
    }

    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    /// Full command lines of every recorded call, secrets included.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CapturedRun, DesError> {
        lock(&self.calls).push(invocation.clone());

        let line = invocation.command_line();
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|rule| line.contains(&rule.pattern)) {
            Some(rule) => (rule.responder)(invocation),
            None => Err(DesError::ProcessExecution {
                command: invocation.display_line(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted reply"),
            }),
        }
    }
}

// ============================================================================
// HDFS
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Node {
    Dir,
    File(u64),
}

/// An in-memory directory tree implementing [`HadoopFs`].
#[derive(Debug, Default)]
pub struct FakeHadoopFs {
    nodes: Mutex<BTreeMap<String, Node>>,
    failing_du: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl FakeHadoopFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn with_file(self, path: &str, size: u64) -> Self {
        self.add_file(path, size);
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    pub fn add_file(&self, path: &str, size: u64) {
        self.add_parents(path);
        lock(&self.nodes).insert(path.to_string(), Node::File(size));
    }

    pub fn add_dir(&self, path: &str) {
        self.add_parents(path);
        lock(&self.nodes).insert(path.to_string(), Node::Dir);
    }

    /// Make `du` fail for exactly this path.
    pub fn with_failing_du(self, path: &str) -> Self {
        lock(&self.failing_du).push(path.to_string());
        self
    }

    /// Paths passed to `remove_recursive` that existed.
    pub fn removed(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }

    fn add_parents(&self, path: &str) {
        let mut nodes = lock(&self.nodes);
        let mut parent = parent_of(path);
        while let Some(dir) = parent {
            nodes.entry(dir.to_string()).or_insert(Node::Dir);
            parent = parent_of(dir);
        }
    }
}

fn parent_of(path: &str) -> Option<&str> {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => None,
        Some(index) => Some(&path[..index]),
    }
}

fn is_under(candidate: &str, root: &str) -> bool {
    candidate == root
        || candidate
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl HadoopFs for FakeHadoopFs {
    async fn exists(&self, path: &str) -> Result<bool, DesError> {
        Ok(lock(&self.nodes).contains_key(path))
    }

    async fn is_dir(&self, path: &str) -> Result<bool, DesError> {
        Ok(matches!(lock(&self.nodes).get(path), Some(Node::Dir)))
    }

    async fn list(&self, path: &str) -> Result<Vec<HdfsEntry>, DesError> {
        let nodes = lock(&self.nodes);
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(DesError::FileSystem(format!("No such directory: {path}")));
        }
        Ok(nodes
            .iter()
            .filter(|(candidate, _)| parent_of(candidate) == Some(path))
            .map(|(candidate, node)| HdfsEntry {
                path: candidate.clone(),
                is_dir: matches!(node, Node::Dir),
                size: match node {
                    Node::Dir => 0,
                    Node::File(size) => *size,
                },
            })
            .collect())
    }

    async fn du(&self, path: &str) -> Result<u64, DesError> {
        if lock(&self.failing_du).iter().any(|failing| failing == path) {
            return Err(DesError::SizeComputation {
                path: path.to_string(),
                reason: "scripted du failure".to_string(),
            });
        }
        let nodes = lock(&self.nodes);
        if !nodes.contains_key(path) {
            return Err(DesError::SizeComputation {
                path: path.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        Ok(nodes
            .iter()
            .filter(|(candidate, _)| is_under(candidate, path))
            .map(|(_, node)| match node {
                Node::Dir => 0,
                Node::File(size) => *size,
            })
            .sum())
    }

    async fn remove_recursive(&self, path: &str) -> Result<(), DesError> {
        let mut nodes = lock(&self.nodes);
        if !nodes.contains_key(path) {
            return Err(DesError::FileSystem(format!(
                "rm: `{path}': No such file or directory"
            )));
        }
        nodes.retain(|candidate, _| !is_under(candidate, path));
        lock(&self.removed).push(path.to_string());
        Ok(())
    }
}

// ============================================================================
// Object storage
// ============================================================================

/// An in-memory bucket set implementing [`ObjectStore`].
#[derive(Debug, Default)]
pub struct FakeObjectStore {
    objects: Mutex<BTreeMap<(String, String), u64>>,
    deleted: Mutex<Vec<String>>,
    fail_deletes: Mutex<bool>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, size: u64) {
        lock(&self.objects).insert((bucket.to_string(), key.to_string()), size);
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(candidate, _)| candidate == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Keys passed to `delete_object`, in call order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn fail_deletes(&self, fail: bool) {
        *lock(&self.fail_deletes) = fail;
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, DesError> {
        Ok(lock(&self.objects)
            .iter()
            .filter(|((candidate, key), _)| candidate == bucket && key.starts_with(prefix))
            .map(|((_, key), size)| ObjectEntry {
                key: key.clone(),
                size: *size,
            })
            .collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), DesError> {
        if *lock(&self.fail_deletes) {
            return Err(DesError::Storage(format!("scripted delete failure for {key}")));
        }
        lock(&self.deleted).push(key.to_string());
        lock(&self.objects).remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Hands out the same [`FakeObjectStore`] for every request.
#[derive(Debug, Clone)]
pub struct FakeStoreFactory {
    store: Arc<FakeObjectStore>,
}

impl FakeStoreFactory {
    pub fn new(store: Arc<FakeObjectStore>) -> Self {
        Self { store }
    }
}

impl ObjectStoreFactory for FakeStoreFactory {
    fn connect(&self, _credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>, DesError> {
        Ok(self.store.clone())
    }
}
