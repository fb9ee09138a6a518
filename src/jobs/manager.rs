//! Cooperative job manager.
//!
//! A pool of OS worker threads pulls from three priority queues. Jobs run to
//! a natural suspension point and return an intent; the manager parks,
//! requeues or completes them under one mutex. Wakes arriving while a job is
//! running are armed through a per-record wake generation so a following
//! `Sleep` re-enqueues instead of parking (no lost wakes).

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::ast::set_worker_shard;
use crate::jobs::{Job, JobClientId, JobId, JobPriority, JobResult, TaskState, WaitKey};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum RecState {
    Ready,
    Running,
    Waiting,
    Done,
}

struct JobRecord {
    /// Present unless the job is currently running on a worker. Keeps the
    /// job alive while scheduled.
    job: Option<Box<dyn Job>>,
    state: RecState,
    priority: JobPriority,
    client: JobClientId,
    /// Wake ticket: bumped by every wake; compared against the value
    /// snapshotted when the run started.
    wake_gen: u64,
    run_gen: u64,
    /// Jobs parked until this one completes.
    dependents: Vec<JobId>,
    /// Ledger key this job is parked under, if any.
    wait_key: Option<WaitKey>,
}

#[derive(Default)]
struct Inner {
    records: Vec<JobRecord>,
    ready: [VecDeque<JobId>; 3],
    ledger: FxHashMap<WaitKey, Vec<JobId>>,
    running: usize,
    shutdown: bool,
}

impl Inner {
    fn pop_ready(&mut self) -> Option<JobId> {
        for queue in self.ready.iter_mut() {
            if let Some(id) = queue.pop_front() {
                return Some(id);
            }
        }
        None
    }

    fn push_ready(&mut self, id: JobId) {
        let rec = &mut self.records[id.0 as usize];
        debug_assert_ne!(rec.state, RecState::Done);
        rec.state = RecState::Ready;
        self.unregister_wait(id);
        let prio = self.records[id.0 as usize].priority as usize;
        self.ready[prio].push_back(id);
    }

    fn unregister_wait(&mut self, id: JobId) {
        let rec = &mut self.records[id.0 as usize];
        if let Some(key) = rec.wait_key.take() {
            if let Some(list) = self.ledger.get_mut(&key) {
                list.retain(|j| *j != id);
                if list.is_empty() {
                    self.ledger.remove(&key);
                }
            }
        }
    }

    /// Wake one job: ready it when parked, arm the ticket otherwise.
    fn wake_locked(&mut self, id: JobId) -> bool {
        let rec = &mut self.records[id.0 as usize];
        rec.wake_gen += 1;
        if rec.state == RecState::Waiting {
            self.push_ready(id);
            true
        } else {
            false
        }
    }

    fn has_work(&self, client: Option<JobClientId>) -> bool {
        let ready = self
            .ready
            .iter()
            .flatten()
            .any(|id| client.map_or(true, |c| self.records[id.0 as usize].client == c));
        if ready {
            return true;
        }
        self.records
            .iter()
            .any(|r| r.state == RecState::Running && client.map_or(true, |c| r.client == c))
    }
}

pub struct JobManager {
    inner: Mutex<Inner>,
    work_cv: Condvar,
    idle_cv: Condvar,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the worker pool. Each worker owns an AST shard index.
    pub fn start(self: &Arc<Self>, count: usize) {
        let count = count.max(1);
        let mut threads = self.threads.lock();
        for index in 0..count {
            let mgr = Arc::clone(self);
            threads.push(
                std::thread::Builder::new()
                    .name(format!("swgc-worker-{index}"))
                    .spawn(move || mgr.worker_loop(index))
                    .expect("spawn worker thread"),
            );
        }
    }

    pub fn enqueue(&self, job: Box<dyn Job>, priority: JobPriority, client: JobClientId) -> JobId {
        let mut inner = self.inner.lock();
        let id = Self::enqueue_locked(&mut inner, job, priority, client);
        drop(inner);
        self.work_cv.notify_one();
        id
    }

    fn enqueue_locked(
        inner: &mut Inner,
        job: Box<dyn Job>,
        priority: JobPriority,
        client: JobClientId,
    ) -> JobId {
        let id = JobId(inner.records.len() as u32);
        inner.records.push(JobRecord {
            job: Some(job),
            state: RecState::Ready,
            priority,
            client,
            wake_gen: 0,
            run_gen: 0,
            dependents: Vec::new(),
            wait_key: None,
        });
        inner.ready[priority as usize].push_back(id);
        id
    }

    /// Wakes a sleeping job, or arms the wake when it is running/ready.
    pub fn wake(&self, id: JobId) {
        let mut inner = self.inner.lock();
        if inner.wake_locked(id) {
            drop(inner);
            self.work_cv.notify_one();
        }
    }

    /// Wakes every non-done job of a client.
    pub fn wake_all(&self, client: JobClientId) {
        let mut inner = self.inner.lock();
        let ids: Vec<JobId> = (0..inner.records.len() as u32)
            .map(JobId)
            .filter(|id| {
                let rec = &inner.records[id.0 as usize];
                rec.client == client && rec.state == RecState::Waiting
            })
            .collect();
        let mut woke = false;
        for id in ids {
            woke |= inner.wake_locked(id);
        }
        drop(inner);
        if woke {
            self.work_cv.notify_all();
        }
    }

    /// Wakes every job parked under the given ledger key.
    pub fn notify(&self, key: WaitKey) {
        let mut inner = self.inner.lock();
        let Some(ids) = inner.ledger.remove(&key) else {
            return;
        };
        let mut woke = false;
        for id in ids {
            // push_ready clears the (already removed) key through
            // unregister_wait's no-op path.
            woke |= inner.wake_locked(id);
        }
        drop(inner);
        if woke {
            self.work_cv.notify_all();
        }
    }

    /// Blocks until no job of the client is ready or running. Sleepers are
    /// allowed.
    pub fn wait_all(&self, client: JobClientId) {
        let mut inner = self.inner.lock();
        while inner.has_work(Some(client)) {
            self.idle_cv.wait(&mut inner);
        }
    }

    /// Ids of parked jobs of the client.
    pub fn waiting_jobs(&self, client: JobClientId) -> Vec<JobId> {
        let inner = self.inner.lock();
        (0..inner.records.len() as u32)
            .map(JobId)
            .filter(|id| {
                let rec = &inner.records[id.0 as usize];
                rec.client == client && rec.state == RecState::Waiting
            })
            .collect()
    }

    /// Wait-state snapshots of parked jobs, for the driver's resolution
    /// rounds and the cycle detector.
    pub fn waiting_states(&self, client: JobClientId) -> Vec<(JobId, TaskState)> {
        let inner = self.inner.lock();
        inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.client == client && rec.state == RecState::Waiting)
            .filter_map(|(i, rec)| {
                rec.job
                    .as_ref()
                    .map(|job| (JobId(i as u32), job.ctx().state.clone()))
            })
            .collect()
    }

    pub fn shutdown(&self) {
        {
            let mut inner = self.inner.lock();
            inner.shutdown = true;
        }
        self.work_cv.notify_all();
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    fn worker_loop(self: Arc<Self>, worker_index: usize) {
        set_worker_shard(worker_index);
        loop {
            let (id, mut job, run_gen) = {
                let mut inner = self.inner.lock();
                loop {
                    if inner.shutdown {
                        return;
                    }
                    if let Some(id) = inner.pop_ready() {
                        let rec = &mut inner.records[id.0 as usize];
                        rec.state = RecState::Running;
                        rec.run_gen = rec.wake_gen;
                        let job = rec.job.take().expect("ready job owns its box");
                        let run_gen = rec.run_gen;
                        inner.running += 1;
                        break (id, job, run_gen);
                    }
                    self.work_cv.wait(&mut inner);
                }
            };

            log::trace!("worker {} runs {}", worker_index, job.kind_name());
            let result = job.run();

            let mut inner = self.inner.lock();
            inner.running -= 1;
            match result {
                JobResult::Done => {
                    let rec = &mut inner.records[id.0 as usize];
                    rec.state = RecState::Done;
                    rec.job = None;
                    drop(job);
                    let dependents = std::mem::take(&mut inner.records[id.0 as usize].dependents);
                    for dep in dependents {
                        inner.wake_locked(dep);
                    }
                }
                JobResult::Sleep => {
                    self.park_or_requeue(&mut inner, id, job, run_gen);
                }
                JobResult::SleepOn(other) => {
                    let other_done = inner.records[other.0 as usize].state == RecState::Done;
                    let rec = &mut inner.records[id.0 as usize];
                    rec.job = Some(job);
                    if other_done || rec.wake_gen != run_gen {
                        inner.push_ready(id);
                    } else {
                        rec.state = RecState::Waiting;
                        inner.records[other.0 as usize].dependents.push(id);
                    }
                }
                JobResult::SpawnAndSleep(child, priority) => {
                    let client = inner.records[id.0 as usize].client;
                    let child_id = Self::enqueue_locked(&mut inner, child, priority, client);
                    let rec = &mut inner.records[id.0 as usize];
                    rec.job = Some(job);
                    if rec.wake_gen != run_gen {
                        inner.push_ready(id);
                    } else {
                        rec.state = RecState::Waiting;
                        inner.records[child_id.0 as usize].dependents.push(id);
                    }
                }
            }

            let more_work = inner.ready.iter().any(|q| !q.is_empty());
            drop(inner);
            if more_work {
                self.work_cv.notify_one();
            }
            // Every completion may satisfy a per-client waitAll; waiters
            // re-check their own predicate.
            self.idle_cv.notify_all();
        }
    }

    /// `Sleep` handling: park under the job's wait key unless a wake
    /// arrived during the run.
    fn park_or_requeue(&self, inner: &mut Inner, id: JobId, job: Box<dyn Job>, run_gen: u64) {
        let key = job.ctx().state.wait_key();
        let rec = &mut inner.records[id.0 as usize];
        rec.job = Some(job);
        if rec.wake_gen != run_gen {
            inner.push_ready(id);
            return;
        }
        rec.state = RecState::Waiting;
        rec.wait_key = key;
        if let Some(key) = key {
            inner.ledger.entry(key).or_default().push(id);
        }
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::TaskContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountJob {
        ctx: TaskContext,
        counter: Arc<AtomicUsize>,
        sleeps_left: usize,
    }

    impl Job for CountJob {
        fn run(&mut self) -> JobResult {
            self.counter.fetch_add(1, Ordering::SeqCst);
            if self.sleeps_left > 0 {
                self.sleeps_left -= 1;
                return JobResult::Sleep;
            }
            JobResult::Done
        }
        fn ctx(&self) -> &TaskContext {
            &self.ctx
        }
        fn ctx_mut(&mut self) -> &mut TaskContext {
            &mut self.ctx
        }
    }

    struct SpawnJob {
        ctx: TaskContext,
        counter: Arc<AtomicUsize>,
        spawned: bool,
    }

    impl Job for SpawnJob {
        fn run(&mut self) -> JobResult {
            if !self.spawned {
                self.spawned = true;
                let child = Box::new(CountJob {
                    ctx: TaskContext::default(),
                    counter: self.counter.clone(),
                    sleeps_left: 0,
                });
                return JobResult::SpawnAndSleep(child, JobPriority::High);
            }
            self.counter.fetch_add(100, Ordering::SeqCst);
            JobResult::Done
        }
        fn ctx(&self) -> &TaskContext {
            &self.ctx
        }
        fn ctx_mut(&mut self) -> &mut TaskContext {
            &mut self.ctx
        }
    }

    fn manager(workers: usize) -> Arc<JobManager> {
        let mgr = Arc::new(JobManager::new());
        mgr.start(workers);
        mgr
    }

    #[test]
    fn runs_jobs_to_done() {
        let mgr = manager(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            mgr.enqueue(
                Box::new(CountJob {
                    ctx: TaskContext::default(),
                    counter: counter.clone(),
                    sleeps_left: 0,
                }),
                JobPriority::Normal,
                1,
            );
        }
        mgr.wait_all(1);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        mgr.shutdown();
    }

    #[test]
    fn sleepers_park_until_woken() {
        let mgr = manager(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let id = mgr.enqueue(
            Box::new(CountJob {
                ctx: TaskContext::default(),
                counter: counter.clone(),
                sleeps_left: 1,
            }),
            JobPriority::Normal,
            1,
        );
        mgr.wait_all(1);
        // Ran once and parked.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.waiting_jobs(1), vec![id]);

        mgr.wake(id);
        mgr.wait_all(1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(mgr.waiting_jobs(1).is_empty());
        mgr.shutdown();
    }

    #[test]
    fn spawn_and_sleep_resumes_after_child() {
        let mgr = manager(2);
        let counter = Arc::new(AtomicUsize::new(0));
        mgr.enqueue(
            Box::new(SpawnJob {
                ctx: TaskContext::default(),
                counter: counter.clone(),
                spawned: false,
            }),
            JobPriority::Normal,
            1,
        );
        mgr.wait_all(1);
        // Child ran (+1), parent resumed after it (+100).
        assert_eq!(counter.load(Ordering::SeqCst), 101);
        mgr.shutdown();
    }

    #[test]
    fn wake_all_requeues_client_sleepers() {
        let mgr = manager(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            mgr.enqueue(
                Box::new(CountJob {
                    ctx: TaskContext::default(),
                    counter: counter.clone(),
                    sleeps_left: 1,
                }),
                JobPriority::Normal,
                7,
            );
        }
        mgr.wait_all(7);
        assert_eq!(mgr.waiting_jobs(7).len(), 3);
        mgr.wake_all(7);
        mgr.wait_all(7);
        assert_eq!(counter.load(Ordering::SeqCst), 6);
        mgr.shutdown();
    }

    #[test]
    fn priorities_pop_high_first() {
        // Single worker so ordering is deterministic once queued.
        let mgr = Arc::new(JobManager::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        struct OrderJob {
            ctx: TaskContext,
            tag: u8,
            order: Arc<Mutex<Vec<u8>>>,
        }
        impl Job for OrderJob {
            fn run(&mut self) -> JobResult {
                self.order.lock().push(self.tag);
                JobResult::Done
            }
            fn ctx(&self) -> &TaskContext {
                &self.ctx
            }
            fn ctx_mut(&mut self) -> &mut TaskContext {
                &mut self.ctx
            }
        }

        mgr.enqueue(
            Box::new(OrderJob { ctx: TaskContext::default(), tag: 2, order: order.clone() }),
            JobPriority::Low,
            1,
        );
        mgr.enqueue(
            Box::new(OrderJob { ctx: TaskContext::default(), tag: 1, order: order.clone() }),
            JobPriority::Normal,
            1,
        );
        mgr.enqueue(
            Box::new(OrderJob { ctx: TaskContext::default(), tag: 0, order: order.clone() }),
            JobPriority::High,
            1,
        );
        mgr.start(1);
        mgr.wait_all(1);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        mgr.shutdown();
    }
}
