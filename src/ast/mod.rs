pub mod node;
pub mod store;
pub mod visit;

pub use crate::core::{AstNodeRef, SpanRef};
pub use node::{
    AstBase, AstFlags, AstKind, GlobalMode, ModifierFlags, NodeSema, NodeSemaFlags, TypeExprKind,
};
pub use store::{set_worker_shard, worker_shard, AstStore};
pub use visit::{AstVisit, AstVisitor, Flow, VisitStatus};
