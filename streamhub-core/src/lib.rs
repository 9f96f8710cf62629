pub mod arithmetic;
pub mod augment;
pub mod comparison;
pub mod logical;
pub mod node;
pub mod pipeline;
pub mod query;
pub mod scanner;
pub mod source;
pub use arithmetic::{ArithOp, ArithmeticNode};
pub use augment::Augmenter;
pub use comparison::{CmpOp, ComparisonNode, EPSILON};
pub use logical::{LogicalNode, LogicalOp};
pub use node::{describe, NodeRef};
pub use pipeline::{FilterStats, Outcome, StreamFilter};
pub use query::StreamQuery;
pub use source::resolve_inputs;
pub use streamhub_common::{FieldSchema, Record, Result, StreamHubError};
