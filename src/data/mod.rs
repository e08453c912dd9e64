//! Data structures for contaminant-removal evaluation.

mod abundance_table;
mod decision;
mod metadata;
mod reference;
mod result;

pub use abundance_table::AbundanceTable;
pub use decision::{CellDecisions, Classification, Decisions, UndecidedPolicy};
pub use metadata::{Metadata, Variable, VariableType};
pub use reference::ReferenceSet;
pub use result::{Metric, MethodResult, MethodResultSet, MethodType};
