//! Job manager behavior through the public API: dependency sleeps, ledger
//! notifications, client-scoped waitAll.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use swgc::core::{IdentifierRef, SymbolRef};
use swgc::jobs::{
    Job, JobManager, JobPriority, JobResult, TaskContext, TaskState, WaitKey, WaitKind,
};
use swgc::sema::symbol::SymbolState;

struct StepJob {
    ctx: TaskContext,
    log: Arc<AtomicUsize>,
    program: Vec<Step>,
    pc: usize,
}

enum Step {
    Add(usize),
    SleepOn(swgc::jobs::JobId),
    WaitIdentifier(IdentifierRef),
    WaitSymbol(SymbolRef),
}

impl Job for StepJob {
    fn run(&mut self) -> JobResult {
        self.ctx.state.reset();
        while self.pc < self.program.len() {
            let step = &self.program[self.pc];
            self.pc += 1;
            match step {
                Step::Add(n) => {
                    self.log.fetch_add(*n, Ordering::SeqCst);
                }
                Step::SleepOn(dep) => return JobResult::SleepOn(*dep),
                Step::WaitIdentifier(id) => {
                    self.ctx.state = TaskState {
                        kind: WaitKind::Identifier,
                        id: *id,
                        ..TaskState::default()
                    };
                    return JobResult::Sleep;
                }
                Step::WaitSymbol(sym) => {
                    self.ctx.state = TaskState {
                        kind: WaitKind::SymTyped,
                        symbol: *sym,
                        ..TaskState::default()
                    };
                    return JobResult::Sleep;
                }
            }
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

fn step_job(log: &Arc<AtomicUsize>, program: Vec<Step>) -> Box<StepJob> {
    Box::new(StepJob {
        ctx: TaskContext::default(),
        log: log.clone(),
        program,
        pc: 0,
    })
}

fn manager() -> Arc<JobManager> {
    let mgr = Arc::new(JobManager::new());
    mgr.start(4);
    mgr
}

#[test]
fn sleep_on_runs_after_dependency() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));

    let dep = mgr.enqueue(
        step_job(&log, vec![Step::Add(1)]),
        JobPriority::Normal,
        1,
    );
    mgr.enqueue(
        step_job(&log, vec![Step::SleepOn(dep), Step::Add(10)]),
        JobPriority::Normal,
        1,
    );
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 11);
    mgr.shutdown();
}

#[test]
fn identifier_notification_wakes_waiter() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));
    let id = IdentifierRef::new(7);

    mgr.enqueue(
        step_job(&log, vec![Step::WaitIdentifier(id), Step::Add(5)]),
        JobPriority::Normal,
        1,
    );
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 0);
    assert_eq!(mgr.waiting_jobs(1).len(), 1);

    // Wrong key: nothing moves.
    mgr.notify(WaitKey::Identifier(IdentifierRef::new(8)));
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 0);

    mgr.notify(WaitKey::Identifier(id));
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 5);
    mgr.shutdown();
}

#[test]
fn symbol_transition_key_wakes_waiter() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));
    let sym = SymbolRef::new(3);

    mgr.enqueue(
        step_job(&log, vec![Step::WaitSymbol(sym), Step::Add(2)]),
        JobPriority::Normal,
        1,
    );
    mgr.wait_all(1);
    assert_eq!(mgr.waiting_jobs(1).len(), 1);

    mgr.notify(WaitKey::Symbol(sym, SymbolState::Typed));
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 2);
    mgr.shutdown();
}

#[test]
fn waiting_states_expose_wait_keys() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));
    let id = IdentifierRef::new(42);

    mgr.enqueue(
        step_job(&log, vec![Step::WaitIdentifier(id)]),
        JobPriority::Normal,
        1,
    );
    mgr.wait_all(1);

    let states = mgr.waiting_states(1);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].1.kind, WaitKind::Identifier);
    assert_eq!(states[0].1.id, id);
    assert_eq!(states[0].1.wait_key(), Some(WaitKey::Identifier(id)));
    mgr.shutdown();
}

#[test]
fn wait_all_is_client_scoped() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));
    let id = IdentifierRef::new(9);

    // Client 2 parks forever; client 1 must still drain.
    mgr.enqueue(
        step_job(&log, vec![Step::WaitIdentifier(id)]),
        JobPriority::Normal,
        2,
    );
    for _ in 0..4 {
        mgr.enqueue(step_job(&log, vec![Step::Add(1)]), JobPriority::Normal, 1);
    }
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 4);
    assert_eq!(mgr.waiting_jobs(2).len(), 1);
    mgr.shutdown();
}

#[test]
fn wake_all_requeues_only_the_client() {
    let mgr = manager();
    let log = Arc::new(AtomicUsize::new(0));
    let id = IdentifierRef::new(11);

    mgr.enqueue(
        step_job(&log, vec![Step::WaitIdentifier(id), Step::Add(1)]),
        JobPriority::Normal,
        1,
    );
    mgr.enqueue(
        step_job(&log, vec![Step::WaitIdentifier(id), Step::Add(100)]),
        JobPriority::Normal,
        2,
    );
    mgr.wait_all(1);
    mgr.wait_all(2);

    mgr.wake_all(1);
    mgr.wait_all(1);
    assert_eq!(log.load(Ordering::SeqCst), 1);
    assert_eq!(mgr.waiting_jobs(2).len(), 1);
    mgr.shutdown();
}
