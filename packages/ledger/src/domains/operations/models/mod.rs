pub mod operation;
pub mod query;

pub use operation::{EditMemberData, MintData, MintType, OpCode, Operation, OperationData};
pub use query::OperationQuery;
