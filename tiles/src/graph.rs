use crate::errors::{Result, TileError};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Names one tile slot of one [crate::Tiles] grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub(crate) grid: usize,
    pub(crate) index: usize,
}

/// Handle on a task submitted to a [TaskGraph]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

type Job<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

struct TaskSpec<'a> {
    label: &'static str,
    job: Job<'a>,
    dependencies: Vec<usize>,
}

#[derive(Default)]
struct TileAccess {
    last_writer: Option<usize>,
    readers: Vec<usize>,
}

/// A dataflow graph of tile tasks.
///
/// Each submitted task declares the tiles it reads and the tiles it writes. Edges are
/// inferred from those declarations in submission order:
/// * a reader runs after the last writer of each tile it reads,
/// * a writer runs after the last writer and after every reader since that write.
///
/// As a task can only depend on tasks submitted before it, the graph is acyclic.
/// [TaskGraph::run] then executes the tasks on the rayon thread pool, each one being
/// spawned as soon as all its predecessors are done.
pub struct TaskGraph<'a> {
    tasks: Vec<TaskSpec<'a>>,
    accesses: HashMap<TileKey, TileAccess>,
}

impl<'a> Default for TaskGraph<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TaskGraph<'a> {
    /// An empty graph
    pub fn new() -> Self {
        TaskGraph {
            tasks: Vec::new(),
            accesses: HashMap::new(),
        }
    }

    /// Number of submitted tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task was submitted
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Register `job` reading `reads` tiles and writing `writes` tiles.
    /// A tile both read and written only needs to be declared in `writes`.
    pub fn submit<J>(
        &mut self,
        label: &'static str,
        reads: &[TileKey],
        writes: &[TileKey],
        job: J,
    ) -> TaskId
    where
        J: FnOnce() -> Result<()> + Send + 'a,
    {
        let id = self.tasks.len();
        let mut dependencies = Vec::new();
        for key in reads {
            let access = self.accesses.entry(*key).or_default();
            dependencies.extend(access.last_writer);
            access.readers.push(id);
        }
        for key in writes {
            let access = self.accesses.entry(*key).or_default();
            dependencies.extend(access.last_writer);
            dependencies.extend(access.readers.drain(..).filter(|&reader| reader != id));
            access.last_writer = Some(id);
        }
        dependencies.sort_unstable();
        dependencies.dedup();
        self.tasks.push(TaskSpec {
            label,
            job: Box::new(job),
            dependencies,
        });
        TaskId(id)
    }

    /// Direct predecessors of `task`
    pub fn dependencies(&self, task: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks[task.0].dependencies.iter().map(|&id| TaskId(id))
    }

    /// Execute every task and block until completion.
    ///
    /// The first failing task aborts the run: none of its successors is spawned, tasks
    /// already running are left to finish and the error is returned.
    pub fn run(self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }
        let now = Instant::now();
        let n_tasks = self.tasks.len();

        let mut successors = vec![Vec::new(); n_tasks];
        for (id, task) in self.tasks.iter().enumerate() {
            for &dep in task.dependencies.iter() {
                successors[dep].push(id);
            }
        }
        let roots: Vec<usize> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.dependencies.is_empty())
            .map(|(id, _)| id)
            .collect();
        let nodes = self
            .tasks
            .into_iter()
            .zip(successors)
            .map(|(task, successors)| Node {
                label: task.label,
                pending: AtomicUsize::new(task.dependencies.len()),
                job: Mutex::new(Some(task.job)),
                successors,
            })
            .collect();
        let execution = Execution {
            nodes,
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
        };

        rayon::scope(|s| {
            let execution = &execution;
            for &root in roots.iter() {
                s.spawn(move |s| execute(s, execution, root));
            }
        });

        debug!(
            "Task graph of {} tasks executed in {:?}",
            n_tasks,
            now.elapsed()
        );
        match execution
            .error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Node<'a> {
    label: &'static str,
    job: Mutex<Option<Job<'a>>>,
    successors: Vec<usize>,
    pending: AtomicUsize,
}

struct Execution<'a> {
    nodes: Vec<Node<'a>>,
    failed: AtomicBool,
    error: Mutex<Option<TileError>>,
}

impl<'a> Execution<'a> {
    fn fail(&self, label: &str, err: TileError) {
        debug!("Task {} failed: {}", label, err);
        let mut first = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if first.is_none() {
            *first = Some(err);
        }
        self.failed.store(true, Ordering::Release);
    }
}

fn execute<'scope, 'a: 'scope>(
    scope: &rayon::Scope<'scope>,
    execution: &'scope Execution<'a>,
    id: usize,
) {
    if execution.failed.load(Ordering::Acquire) {
        return;
    }
    let node = &execution.nodes[id];
    let job = node
        .job
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(job) = job {
        if let Err(err) = job() {
            execution.fail(node.label, err);
            return;
        }
    }
    for &succ in node.successors.iter() {
        if execution.nodes[succ].pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            scope.spawn(move |s| execute(s, execution, succ));
        }
    }
}
