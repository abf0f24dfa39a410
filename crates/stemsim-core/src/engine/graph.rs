//! Dependency-tracked recomputation of derived values.
//!
//! A [`RecomputationGraph`] holds three kinds of nodes:
//!
//! - **Sources** are written from outside through [`RecomputationGraph::set`].
//! - **Sync** nodes are recomputed lazily on read whenever an input changed.
//! - **Async** nodes are recomputed in a background task once their inputs
//!   have been quiet for the debounce window. Until then a read returns the
//!   previous value flagged as stale.
//!
//! Every scheduled async recomputation carries a version stamp. A result that
//! arrives after a newer request has been made is dropped, so the committed
//! value always corresponds to the latest inputs.
//!
//! The graph is single-threaded: it must be built and driven inside a
//! [`tokio::task::LocalSet`], and compute closures run to completion without
//! yielding. Adding an async node, or writing a source that feeds one, outside
//! any Tokio runtime fails with [`GraphError::NoRuntime`].

use super::error::{ComputeError, GraphError};
use slotmap::{SlotMap, new_key_type};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Quiet period an async node waits for before recomputing.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

new_key_type! {
    /// Identifier of a node inside one graph.
    pub struct NodeKey;
}

type Value = Rc<dyn Any>;
type ComputeFn = Rc<dyn Fn(&Inputs) -> Result<Value, ComputeError>>;

/// A typed reference to a graph node.
pub trait Handle<T> {
    fn key(&self) -> NodeKey;
}

/// Handle of a writable source node holding a `T`.
pub struct Source<T> {
    key: NodeKey,
    _marker: PhantomData<fn() -> T>,
}

/// Handle of a computed node producing a `T`.
pub struct Derived<T> {
    key: NodeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Source<T> {}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Derived<T> {}

impl<T> Handle<T> for Source<T> {
    fn key(&self) -> NodeKey {
        self.key
    }
}

impl<T> Handle<T> for Derived<T> {
    fn key(&self) -> NodeKey {
        self.key
    }
}

impl<T> std::fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Source").field(&self.key).finish()
    }
}

impl<T> std::fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Derived").field(&self.key).finish()
    }
}

/// Resolved input values handed to a compute closure.
pub struct Inputs {
    dependent: &'static str,
    values: HashMap<NodeKey, (&'static str, Value)>,
}

impl Inputs {
    /// Borrows the current value of a declared dependency.
    pub fn get<T: 'static>(&self, handle: &impl Handle<T>) -> Result<&T, GraphError> {
        let (name, value) =
            self.values
                .get(&handle.key())
                .ok_or(GraphError::UndeclaredDependency {
                    dependent: self.dependent,
                })?;
        (**value)
            .downcast_ref::<T>()
            .ok_or(GraphError::TypeMismatch { node: *name })
    }
}

/// What a read observed for one node.
#[derive(Debug)]
pub enum Snapshot<T> {
    /// The node has never produced a value.
    Pending,
    /// The latest committed value. `stale` is set while a newer one is on its way.
    Ready { value: Rc<T>, stale: bool },
    /// The latest computation failed. `last` is the previous good value, if any.
    Failed {
        error: Rc<ComputeError>,
        last: Option<Rc<T>>,
    },
}

impl<T> Snapshot<T> {
    /// Best value available for display, stale or not.
    pub fn value(&self) -> Option<&Rc<T>> {
        match self {
            Snapshot::Pending => None,
            Snapshot::Ready { value, .. } => Some(value),
            Snapshot::Failed { last, .. } => last.as_ref(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Snapshot::Ready { stale: true, .. })
    }

    pub fn error(&self) -> Option<&ComputeError> {
        match self {
            Snapshot::Failed { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

enum NodeKind {
    Source,
    Sync(ComputeFn),
    Async(ComputeFn),
}

enum Cached {
    Unresolved,
    Resolved(Value),
}

struct Node {
    name: &'static str,
    kind: NodeKind,
    deps: Vec<NodeKey>,
    dependents: Vec<NodeKey>,
    cached: Cached,
    error: Option<Rc<ComputeError>>,
    dirty: bool,
    requested: u64,
    timer: Option<JoinHandle<()>>,
    computations: u64,
}

impl Node {
    fn new(name: &'static str, kind: NodeKind, deps: Vec<NodeKey>, cached: Cached) -> Self {
        let dirty = !matches!(kind, NodeKind::Source);
        Self {
            name,
            kind,
            deps,
            dependents: Vec::new(),
            cached,
            error: None,
            dirty,
            requested: 0,
            timer: None,
            computations: 0,
        }
    }

    fn is_async(&self) -> bool {
        matches!(self.kind, NodeKind::Async(_))
    }

    fn last_value(&self) -> Option<Value> {
        match &self.cached {
            Cached::Resolved(value) => Some(value.clone()),
            Cached::Unresolved => None,
        }
    }

    fn resolution(&self) -> Resolution {
        if let Some(error) = &self.error {
            return Resolution::Failed {
                node: self.name,
                error: error.clone(),
            };
        }
        match &self.cached {
            Cached::Resolved(value) => Resolution::Value(value.clone()),
            Cached::Unresolved => Resolution::Unresolved,
        }
    }
}

enum Resolution {
    Value(Value),
    Unresolved,
    Failed {
        node: &'static str,
        error: Rc<ComputeError>,
    },
}

enum Gathered {
    Ready(Inputs),
    Unresolved,
    Failed(ComputeError),
}

struct GraphInner {
    nodes: SlotMap<NodeKey, Node>,
    debounce: Duration,
    settled: Rc<Notify>,
}

impl Drop for GraphInner {
    fn drop(&mut self) {
        for node in self.nodes.values_mut() {
            if let Some(timer) = node.timer.take() {
                timer.abort();
            }
        }
    }
}

/// Shared handle to a graph of sources and derived nodes.
#[derive(Clone)]
pub struct RecomputationGraph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Default for RecomputationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RecomputationGraph {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(GraphInner {
                nodes: SlotMap::with_key(),
                debounce,
                settled: Rc::new(Notify::new()),
            })),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.borrow().debounce
    }

    pub fn add_source<T: 'static>(&self, name: &'static str, initial: T) -> Source<T> {
        let value: Value = Rc::new(initial);
        let key = self.inner.borrow_mut().nodes.insert(Node::new(
            name,
            NodeKind::Source,
            Vec::new(),
            Cached::Resolved(value),
        ));
        Source {
            key,
            _marker: PhantomData,
        }
    }

    /// Adds a node recomputed on read whenever one of `deps` changed.
    pub fn add_sync<T, F>(
        &self,
        name: &'static str,
        deps: &[NodeKey],
        compute: F,
    ) -> Result<Derived<T>, GraphError>
    where
        T: 'static,
        F: Fn(&Inputs) -> Result<T, ComputeError> + 'static,
    {
        let key = self.insert_derived(name, deps, NodeKind::Sync(erase(compute)))?;
        Ok(Derived {
            key,
            _marker: PhantomData,
        })
    }

    /// Adds a node recomputed in the background after its inputs settle.
    ///
    /// The first computation is scheduled immediately.
    pub fn add_async<T, F>(
        &self,
        name: &'static str,
        deps: &[NodeKey],
        compute: F,
    ) -> Result<Derived<T>, GraphError>
    where
        T: 'static,
        F: Fn(&Inputs) -> Result<T, ComputeError> + 'static,
    {
        ensure_runtime()?;
        let key = self.insert_derived(name, deps, NodeKind::Async(erase(compute)))?;
        self.schedule(key);
        Ok(Derived {
            key,
            _marker: PhantomData,
        })
    }

    fn insert_derived(
        &self,
        name: &'static str,
        deps: &[NodeKey],
        kind: NodeKind,
    ) -> Result<NodeKey, GraphError> {
        let mut inner = self.inner.borrow_mut();
        if deps.iter().any(|dep| !inner.nodes.contains_key(*dep)) {
            return Err(GraphError::UnknownNode);
        }
        let key = inner
            .nodes
            .insert(Node::new(name, kind, deps.to_vec(), Cached::Unresolved));
        for dep in deps {
            if let Some(node) = inner.nodes.get_mut(*dep) {
                node.dependents.push(key);
            }
        }
        Ok(key)
    }

    /// Writes a source and invalidates everything downstream of it.
    pub fn set<T: 'static>(&self, source: &Source<T>, value: T) -> Result<(), GraphError> {
        if self.feeds_async(source.key) {
            ensure_runtime()?;
        }
        {
            let mut inner = self.inner.borrow_mut();
            let node = inner
                .nodes
                .get_mut(source.key)
                .ok_or(GraphError::UnknownNode)?;
            trace!(node = node.name, "Source updated.");
            node.cached = Cached::Resolved(Rc::new(value));
        }
        self.invalidate_dependents(source.key);
        Ok(())
    }

    /// Reads a node, recomputing sync nodes on the way if needed.
    pub fn get<T: 'static>(&self, handle: &impl Handle<T>) -> Result<Snapshot<T>, GraphError> {
        let key = handle.key();
        if !self.inner.borrow().nodes.contains_key(key) {
            return Err(GraphError::UnknownNode);
        }
        let resolution = self.resolve(key);
        let stale = self.upstream_pending(key);
        let (name, last) = {
            let inner = self.inner.borrow();
            let node = &inner.nodes[key];
            (node.name, node.last_value())
        };
        let downcast = |value: Value| {
            Rc::downcast::<T>(value).map_err(|_| GraphError::TypeMismatch { node: name })
        };
        Ok(match resolution {
            Resolution::Unresolved => Snapshot::Pending,
            Resolution::Value(value) => Snapshot::Ready {
                value: downcast(value)?,
                stale,
            },
            Resolution::Failed { error, .. } => Snapshot::Failed {
                error,
                last: last.map(downcast).transpose()?,
            },
        })
    }

    /// Number of times the node's compute closure has run.
    pub fn computations(&self, key: NodeKey) -> u64 {
        self.inner
            .borrow()
            .nodes
            .get(key)
            .map_or(0, |node| node.computations)
    }

    pub fn name(&self, key: NodeKey) -> Option<&'static str> {
        self.inner.borrow().nodes.get(key).map(|node| node.name)
    }

    /// True while any async node is waiting for a recomputation.
    pub fn has_pending(&self) -> bool {
        self.inner
            .borrow()
            .nodes
            .values()
            .any(|node| node.is_async() && node.dirty)
    }

    /// Waits until no async recomputation is outstanding.
    pub async fn settle(&self) {
        let notify = self.inner.borrow().settled.clone();
        loop {
            let notified = notify.notified();
            if !self.has_pending() {
                return;
            }
            notified.await;
        }
    }

    /// Every node reachable from `key` through dependent edges.
    fn downstream(&self, key: NodeKey) -> Vec<NodeKey> {
        let inner = self.inner.borrow();
        let mut stack: Vec<NodeKey> = inner
            .nodes
            .get(key)
            .map(|node| node.dependents.clone())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        let mut reached = Vec::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            let Some(node) = inner.nodes.get(next) else {
                continue;
            };
            reached.push(next);
            stack.extend(node.dependents.iter().copied());
        }
        reached
    }

    fn feeds_async(&self, key: NodeKey) -> bool {
        let downstream = self.downstream(key);
        let inner = self.inner.borrow();
        downstream
            .into_iter()
            .any(|next| inner.nodes.get(next).is_some_and(Node::is_async))
    }

    fn invalidate_dependents(&self, key: NodeKey) {
        let mut scheduled = Vec::new();
        {
            let downstream = self.downstream(key);
            let mut inner = self.inner.borrow_mut();
            for next in downstream {
                let Some(node) = inner.nodes.get_mut(next) else {
                    continue;
                };
                node.dirty = true;
                if node.is_async() {
                    scheduled.push(next);
                }
            }
        }
        for key in scheduled {
            self.schedule(key);
        }
    }

    fn schedule(&self, key: NodeKey) {
        let weak: Weak<RefCell<GraphInner>> = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();
        let debounce = inner.debounce;
        let Some(node) = inner.nodes.get_mut(key) else {
            return;
        };
        node.requested += 1;
        let version = node.requested;
        if let Some(previous) = node.timer.take() {
            previous.abort();
        }
        trace!(node = node.name, version, "Recomputation scheduled.");
        node.timer = Some(tokio::task::spawn_local(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                RecomputationGraph { inner }.run_async(key, version);
            }
        }));
    }

    fn run_async(&self, key: NodeKey, version: u64) {
        let (name, deps, compute) = {
            let mut inner = self.inner.borrow_mut();
            let Some(node) = inner.nodes.get_mut(key) else {
                return;
            };
            if node.requested != version {
                return;
            }
            node.timer = None;
            let NodeKind::Async(compute) = &node.kind else {
                return;
            };
            (node.name, node.deps.clone(), compute.clone())
        };

        if deps.iter().any(|dep| self.upstream_pending(*dep)) {
            debug!(node = name, "Waiting for upstream recomputations.");
            return;
        }

        let outcome = match self.gather(name, &deps) {
            Gathered::Ready(inputs) => compute(&inputs),
            Gathered::Failed(error) => Err(error),
            Gathered::Unresolved => return,
        };

        {
            let mut inner = self.inner.borrow_mut();
            let Some(node) = inner.nodes.get_mut(key) else {
                return;
            };
            // A compute closure may write a source upstream of its own node.
            if node.requested != version {
                debug!(node = name, version, "Discarding superseded result.");
                return;
            }
            commit(node, outcome);
        }
        self.invalidate_dependents(key);
        let notify = self.inner.borrow().settled.clone();
        notify.notify_waiters();
    }

    fn resolve(&self, key: NodeKey) -> Resolution {
        let (name, deps, compute) = {
            let inner = self.inner.borrow();
            let Some(node) = inner.nodes.get(key) else {
                return Resolution::Unresolved;
            };
            match &node.kind {
                NodeKind::Sync(compute) if node.dirty => {
                    (node.name, node.deps.clone(), compute.clone())
                }
                _ => return node.resolution(),
            }
        };

        let outcome = match self.gather(name, &deps) {
            Gathered::Ready(inputs) => compute(&inputs),
            Gathered::Failed(error) => Err(error),
            Gathered::Unresolved => return Resolution::Unresolved,
        };

        let mut inner = self.inner.borrow_mut();
        let Some(node) = inner.nodes.get_mut(key) else {
            return Resolution::Unresolved;
        };
        commit(node, outcome);
        node.resolution()
    }

    fn gather(&self, dependent: &'static str, deps: &[NodeKey]) -> Gathered {
        let mut values = HashMap::with_capacity(deps.len());
        for &dep in deps {
            match self.resolve(dep) {
                Resolution::Value(value) => {
                    let name = self.name(dep).unwrap_or("<removed>");
                    values.insert(dep, (name, value));
                }
                Resolution::Unresolved => return Gathered::Unresolved,
                Resolution::Failed { node, error } => {
                    return Gathered::Failed(Box::new(GraphError::UpstreamFailed {
                        node,
                        message: error.to_string(),
                    }));
                }
            }
        }
        Gathered::Ready(Inputs { dependent, values })
    }

    fn upstream_pending(&self, key: NodeKey) -> bool {
        let inner = self.inner.borrow();
        let mut stack = vec![key];
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            let Some(node) = inner.nodes.get(next) else {
                continue;
            };
            if node.is_async() && node.dirty {
                return true;
            }
            stack.extend(node.deps.iter().copied());
        }
        false
    }
}

fn ensure_runtime() -> Result<(), GraphError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| GraphError::NoRuntime)
}

fn erase<T, F>(compute: F) -> ComputeFn
where
    T: 'static,
    F: Fn(&Inputs) -> Result<T, ComputeError> + 'static,
{
    Rc::new(move |inputs: &Inputs| compute(inputs).map(|value| Rc::new(value) as Value))
}

fn commit(node: &mut Node, outcome: Result<Value, ComputeError>) {
    node.dirty = false;
    node.computations += 1;
    match outcome {
        Ok(value) => {
            node.cached = Cached::Resolved(value);
            node.error = None;
        }
        Err(error) => {
            warn!(node = node.name, error = %error, "Recomputation failed.");
            node.error = Some(Rc::new(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn source_value_is_readable_immediately() {
        let graph = RecomputationGraph::new();
        let source = graph.add_source("voltage", 200.0_f64);
        match graph.get(&source).unwrap() {
            Snapshot::Ready { value, stale } => {
                assert_eq!(*value, 200.0);
                assert!(!stale);
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sync_node_recomputes_lazily_and_only_when_dirty() {
        let graph = RecomputationGraph::new();
        let source = graph.add_source("x", 2_i32);
        let runs = counter();
        let runs_in = runs.clone();
        let doubled = graph
            .add_sync("doubled", &[source.key()], move |inputs| {
                runs_in.set(runs_in.get() + 1);
                Ok(*inputs.get(&source)? * 2)
            })
            .unwrap();

        assert_eq!(runs.get(), 0);
        assert_eq!(**graph.get(&doubled).unwrap().value().unwrap(), 4);
        assert_eq!(**graph.get(&doubled).unwrap().value().unwrap(), 4);
        assert_eq!(runs.get(), 1);

        graph.set(&source, 5).unwrap();
        graph.set(&source, 7).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(**graph.get(&doubled).unwrap().value().unwrap(), 14);
        assert_eq!(runs.get(), 2);
        assert_eq!(graph.computations(doubled.key()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn async_node_is_pending_until_first_resolution() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 3_i32);
                let squared = graph
                    .add_async("squared", &[source.key()], move |inputs| {
                        let x = *inputs.get(&source)?;
                        Ok(x * x)
                    })
                    .unwrap();

                assert!(matches!(graph.get(&squared).unwrap(), Snapshot::Pending));
                assert!(graph.has_pending());

                graph.settle().await;
                assert!(!graph.has_pending());
                match graph.get(&squared).unwrap() {
                    Snapshot::Ready { value, stale } => {
                        assert_eq!(*value, 9);
                        assert!(!stale);
                    }
                    other => panic!("unexpected snapshot: {other:?}"),
                }
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn async_node_serves_stale_value_while_revalidating() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 3_i32);
                let squared = graph
                    .add_async("squared", &[source.key()], move |inputs| {
                        let x = *inputs.get(&source)?;
                        Ok(x * x)
                    })
                    .unwrap();
                graph.settle().await;

                graph.set(&source, 4).unwrap();
                match graph.get(&squared).unwrap() {
                    Snapshot::Ready { value, stale } => {
                        assert_eq!(*value, 9);
                        assert!(stale);
                    }
                    other => panic!("unexpected snapshot: {other:?}"),
                }

                graph.settle().await;
                let snapshot = graph.get(&squared).unwrap();
                assert!(!snapshot.is_stale());
                assert_eq!(**snapshot.value().unwrap(), 16);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_writes_collapse_into_one_recomputation_with_the_final_value() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("aperture", 0.0_f64);
                let seen = Rc::new(RefCell::new(Vec::new()));
                let seen_in = seen.clone();
                let probe = graph
                    .add_async("probe", &[source.key()], move |inputs| {
                        let aperture = *inputs.get(&source)?;
                        seen_in.borrow_mut().push(aperture);
                        Ok(aperture)
                    })
                    .unwrap();
                graph.settle().await;
                seen.borrow_mut().clear();
                let before = graph.computations(probe.key());

                for aperture in [10.0, 11.0, 12.0, 13.0, 14.0] {
                    graph.set(&source, aperture).unwrap();
                    sleep(Duration::from_millis(10)).await;
                }
                graph.settle().await;

                assert_eq!(graph.computations(probe.key()) - before, 1);
                assert_eq!(*seen.borrow(), vec![14.0]);
                assert_eq!(**graph.get(&probe).unwrap().value().unwrap(), 14.0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn writes_spaced_beyond_the_window_each_recompute() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 0_i32);
                let node = graph
                    .add_async("copy", &[source.key()], move |inputs| {
                        Ok(*inputs.get(&source)?)
                    })
                    .unwrap();
                graph.settle().await;

                graph.set(&source, 1).unwrap();
                sleep(DEFAULT_DEBOUNCE * 2).await;
                graph.set(&source, 2).unwrap();
                graph.settle().await;

                assert_eq!(graph.computations(node.key()), 3);
                assert_eq!(**graph.get(&node).unwrap().value().unwrap(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn chained_async_nodes_compute_downstream_once_with_fresh_input() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 1_i32);
                let first = graph
                    .add_async("first", &[source.key()], move |inputs| {
                        Ok(*inputs.get(&source)? + 1)
                    })
                    .unwrap();
                let seen = Rc::new(RefCell::new(Vec::new()));
                let seen_in = seen.clone();
                let second = graph
                    .add_async("second", &[first.key()], move |inputs| {
                        let value = *inputs.get(&first)?;
                        seen_in.borrow_mut().push(value);
                        Ok(value * 10)
                    })
                    .unwrap();

                graph.settle().await;
                assert_eq!(*seen.borrow(), vec![2]);
                assert_eq!(**graph.get(&second).unwrap().value().unwrap(), 20);

                graph.set(&source, 5).unwrap();
                graph.settle().await;
                assert_eq!(*seen.borrow(), vec![2, 6]);
                assert_eq!(**graph.get(&second).unwrap().value().unwrap(), 60);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_stay_local_and_recover_on_the_next_good_input() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 4.0_f64);
                let root = graph
                    .add_async("root", &[source.key()], move |inputs| {
                        let x = *inputs.get(&source)?;
                        if x < 0.0 {
                            return Err("negative input".into());
                        }
                        Ok(x.sqrt())
                    })
                    .unwrap();
                let doubled = graph
                    .add_sync("doubled", &[source.key()], move |inputs| {
                        Ok(*inputs.get(&source)? * 2.0)
                    })
                    .unwrap();
                graph.settle().await;

                graph.set(&source, -1.0).unwrap();
                graph.settle().await;
                match graph.get(&root).unwrap() {
                    Snapshot::Failed { error, last } => {
                        assert_eq!(error.to_string(), "negative input");
                        assert_eq!(*last.unwrap(), 2.0);
                    }
                    other => panic!("unexpected snapshot: {other:?}"),
                }
                assert_eq!(**graph.get(&doubled).unwrap().value().unwrap(), -2.0);

                graph.set(&source, 9.0).unwrap();
                graph.settle().await;
                let snapshot = graph.get(&root).unwrap();
                assert!(snapshot.error().is_none());
                assert_eq!(**snapshot.value().unwrap(), 3.0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_is_reported_by_dependents() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("x", 0_i32);
                let failing = graph
                    .add_async("failing", &[source.key()], |_: &Inputs| -> Result<i32, ComputeError> {
                        Err("broken".into())
                    })
                    .unwrap();
                let downstream = graph
                    .add_sync("downstream", &[failing.key()], move |inputs| {
                        Ok(*inputs.get(&failing)? + 1)
                    })
                    .unwrap();
                graph.settle().await;

                let snapshot = graph.get(&downstream).unwrap();
                let message = snapshot.error().unwrap().to_string();
                assert!(message.contains("failing"), "{message}");
                assert!(message.contains("broken"), "{message}");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn reading_an_undeclared_input_is_an_error() {
        let graph = RecomputationGraph::new();
        let declared = graph.add_source("declared", 1_i32);
        let other = graph.add_source("other", 2_i32);
        let node = graph
            .add_sync("node", &[declared.key()], move |inputs| {
                Ok(*inputs.get(&other)?)
            })
            .unwrap();

        let message = graph.get(&node).unwrap().error().unwrap().to_string();
        assert!(message.contains("does not depend on"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn a_write_made_during_recomputation_supersedes_its_result() {
        LocalSet::new()
            .run_until(async {
                let graph = RecomputationGraph::new();
                let source = graph.add_source("voltage", 100_i32);
                let weak = Rc::downgrade(&graph.inner);
                let calls = counter();
                let calls_in = calls.clone();
                let node = graph
                    .add_async("doubled", &[source.key()], move |inputs| {
                        let value = *inputs.get(&source)?;
                        calls_in.set(calls_in.get() + 1);
                        if calls_in.get() == 1 {
                            if let Some(inner) = weak.upgrade() {
                                RecomputationGraph { inner }.set(&source, 300)?;
                            }
                        }
                        Ok(value * 2)
                    })
                    .unwrap();
                graph.settle().await;

                assert_eq!(calls.get(), 2);
                assert_eq!(graph.computations(node.key()), 1);
                let snapshot = graph.get(&node).unwrap();
                assert!(!snapshot.is_stale());
                assert_eq!(**snapshot.value().unwrap(), 600);
            })
            .await;
    }

    #[test]
    fn async_nodes_are_refused_without_a_runtime() {
        let graph = RecomputationGraph::new();
        let source = graph.add_source("x", 1_i32);
        let result = graph.add_async("copy", &[source.key()], move |inputs| {
            Ok(*inputs.get(&source)?)
        });
        assert!(matches!(result, Err(GraphError::NoRuntime)));

        let doubled = graph
            .add_sync("doubled", &[source.key()], move |inputs| {
                Ok(*inputs.get(&source)? * 2)
            })
            .unwrap();
        graph.set(&source, 4).unwrap();
        assert_eq!(**graph.get(&doubled).unwrap().value().unwrap(), 8);
    }
}
