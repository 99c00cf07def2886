//! Analysis graph: a DAG of data-transformation nodes feeding layers and
//! dataviews.

pub mod graph;
pub mod node;
pub mod reference;

pub use graph::{AnalysisEvent, AnalysisGraph};
pub use node::{AnalysisNode, AnalysisStatus, ParamValue};
pub use reference::{AnalysisReference, AnalysisSchema, StaticReference};
