//! Re-entrant AST traversal.
//!
//! The visitor is an explicit state machine: a stack of (node, child index,
//! stage) levels. Each `step` invokes exactly one hook; `Pause` returns
//! control to the caller with the cursor intact, and the next `step`
//! re-invokes the same hook with `entering == false`. This is the single
//! suspension boundary of semantic analysis.

use smallvec::SmallVec;

use crate::ast::store::AstStore;
use crate::core::AstNodeRef;

/// Result value of every fallible visitor/sema operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[must_use]
pub enum Flow {
    Continue,
    SkipChildren,
    Pause,
    Stop,
    Error,
}

/// Shorthand mirroring the original RESULT_VERIFY: propagate anything that
/// is not `Continue`.
#[macro_export]
macro_rules! flow_verify {
    ($e:expr) => {
        match $e {
            $crate::ast::visit::Flow::Continue => {}
            other => return other,
        }
    };
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VisitStatus {
    Running,
    Paused,
    Done,
    Stopped,
    Errored,
}

pub trait AstVisitor {
    fn pre_node(&mut self, node: AstNodeRef, entering: bool) -> Flow;
    fn pre_child(&mut self, node: AstNodeRef, child: AstNodeRef, entering: bool) -> Flow;
    fn post_child(&mut self, node: AstNodeRef, child: AstNodeRef, entering: bool) -> Flow;
    fn post_node(&mut self, node: AstNodeRef, entering: bool) -> Flow;

    /// Invoked once with the active ancestor chain when the traversal stops
    /// on an error, so stacked scopes/frames can be unwound.
    fn error_cleanup(&mut self, _active: &[AstNodeRef]) {}
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Stage {
    PreNode,
    PreChild,
    PostChild,
    PostNode,
}

struct VisitLevel {
    node: AstNodeRef,
    children: SmallVec<[AstNodeRef; 8]>,
    child_idx: usize,
    stage: Stage,
}

#[derive(Default)]
pub struct AstVisit {
    stack: Vec<VisitLevel>,
    entering: bool,
    started: bool,
}

impl AstVisit {
    pub fn start(&mut self, root: AstNodeRef) {
        self.stack.clear();
        self.stack.push(VisitLevel {
            node: root,
            children: SmallVec::new(),
            child_idx: 0,
            stage: Stage::PreNode,
        });
        self.entering = true;
        self.started = true;
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn current_node(&self) -> AstNodeRef {
        self.stack
            .last()
            .map(|l| l.node)
            .unwrap_or(AstNodeRef::INVALID)
    }

    /// Active chain from the root down to the current node.
    pub fn active_nodes(&self) -> Vec<AstNodeRef> {
        self.stack.iter().map(|l| l.node).collect()
    }

    pub fn entering(&self) -> bool {
        self.entering
    }

    fn fail(&mut self, visitor: &mut impl AstVisitor, status: VisitStatus) -> VisitStatus {
        let active = self.active_nodes();
        visitor.error_cleanup(&active);
        self.stack.clear();
        status
    }

    /// Runs exactly one hook and advances the cursor.
    pub fn step(&mut self, ast: &AstStore, visitor: &mut impl AstVisitor) -> VisitStatus {
        let entering = self.entering;
        let Some(level) = self.stack.last_mut() else {
            return VisitStatus::Done;
        };
        let node = level.node;
        let stage = level.stage;

        let result = match stage {
            Stage::PreNode => visitor.pre_node(node, entering),
            Stage::PreChild => {
                let child = level.children[level.child_idx];
                visitor.pre_child(node, child, entering)
            }
            Stage::PostChild => {
                let child = level.children[level.child_idx];
                visitor.post_child(node, child, entering)
            }
            Stage::PostNode => visitor.post_node(node, entering),
        };

        match result {
            Flow::Pause => {
                self.entering = false;
                return VisitStatus::Paused;
            }
            Flow::Stop => return self.fail(visitor, VisitStatus::Stopped),
            Flow::Error => return self.fail(visitor, VisitStatus::Errored),
            Flow::Continue | Flow::SkipChildren => {}
        }
        self.entering = true;

        let skip = result == Flow::SkipChildren;
        let level = self.stack.last_mut().expect("level still present");
        match stage {
            Stage::PreNode => {
                if skip {
                    level.stage = Stage::PostNode;
                } else {
                    level.children = ast.children(node);
                    level.child_idx = 0;
                    level.stage = if level.children.is_empty() {
                        Stage::PostNode
                    } else {
                        Stage::PreChild
                    };
                }
            }
            Stage::PreChild => {
                // The matching post_child runs when the child level pops (or
                // immediately on skip).
                level.stage = Stage::PostChild;
                if !skip {
                    let child = level.children[level.child_idx];
                    self.stack.push(VisitLevel {
                        node: child,
                        children: SmallVec::new(),
                        child_idx: 0,
                        stage: Stage::PreNode,
                    });
                }
            }
            Stage::PostChild => {
                if skip {
                    // Skip the remaining siblings.
                    level.stage = Stage::PostNode;
                } else {
                    level.child_idx += 1;
                    level.stage = if level.child_idx == level.children.len() {
                        Stage::PostNode
                    } else {
                        Stage::PreChild
                    };
                }
            }
            Stage::PostNode => {
                self.stack.pop();
                if self.stack.is_empty() {
                    return VisitStatus::Done;
                }
            }
        }

        VisitStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::node::{AstBase, AstKind};
    use crate::core::{SourceViewRef, TokenRef};

    fn base() -> AstBase {
        AstBase::new(TokenRef::new(0), SourceViewRef::new(0))
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(String, AstNodeRef)>,
        pause_once_at: Option<AstNodeRef>,
    }

    impl AstVisitor for Recorder {
        fn pre_node(&mut self, node: AstNodeRef, entering: bool) -> Flow {
            if entering {
                if self.pause_once_at == Some(node) {
                    self.pause_once_at = None;
                    return Flow::Pause;
                }
                self.events.push(("pre".into(), node));
            } else {
                self.events.push(("pre-resume".into(), node));
            }
            Flow::Continue
        }
        fn pre_child(&mut self, _n: AstNodeRef, c: AstNodeRef, _e: bool) -> Flow {
            self.events.push(("prec".into(), c));
            Flow::Continue
        }
        fn post_child(&mut self, _n: AstNodeRef, c: AstNodeRef, _e: bool) -> Flow {
            self.events.push(("postc".into(), c));
            Flow::Continue
        }
        fn post_node(&mut self, node: AstNodeRef, _e: bool) -> Flow {
            self.events.push(("post".into(), node));
            Flow::Continue
        }
    }

    fn tree() -> (AstStore, AstNodeRef, AstNodeRef, AstNodeRef) {
        let ast = AstStore::new();
        let a = ast.make_node(base(), AstKind::IntegerLiteral);
        let b = ast.make_node(base(), AstKind::IntegerLiteral);
        let span = ast.push_span(&[a, b]);
        let root = ast.make_node(base(), AstKind::Block { children: span });
        (ast, root, a, b)
    }

    fn run(ast: &AstStore, visit: &mut AstVisit, rec: &mut Recorder) -> VisitStatus {
        loop {
            match visit.step(ast, rec) {
                VisitStatus::Running => continue,
                status => return status,
            }
        }
    }

    #[test]
    fn canonical_hook_order() {
        let (ast, root, a, b) = tree();
        let mut visit = AstVisit::default();
        visit.start(root);
        let mut rec = Recorder::default();
        assert_eq!(run(&ast, &mut visit, &mut rec), VisitStatus::Done);
        let got: Vec<(String, AstNodeRef)> = rec.events;
        assert_eq!(
            got,
            vec![
                ("pre".into(), root),
                ("prec".into(), a),
                ("pre".into(), a),
                ("post".into(), a),
                ("postc".into(), a),
                ("prec".into(), b),
                ("pre".into(), b),
                ("post".into(), b),
                ("postc".into(), b),
                ("post".into(), root),
            ]
        );
    }

    #[test]
    fn pause_resumes_same_hook() {
        let (ast, root, a, _b) = tree();
        let mut visit = AstVisit::default();
        visit.start(root);
        let mut rec = Recorder {
            pause_once_at: Some(a),
            ..Default::default()
        };
        // First run pauses at a's pre_node.
        let mut status = VisitStatus::Running;
        while status == VisitStatus::Running {
            status = visit.step(&ast, &mut rec);
        }
        assert_eq!(status, VisitStatus::Paused);
        assert_eq!(visit.current_node(), a);
        assert!(!visit.entering());

        // Resume: same node, entering == false on the first re-invocation.
        assert_eq!(run(&ast, &mut visit, &mut rec), VisitStatus::Done);
        assert!(rec
            .events
            .iter()
            .any(|(what, node)| what == "pre-resume" && *node == a));
    }
}
