pub mod cases;

pub use cases::{EdgeCase, EdgeCaseSet, MatchMode};
