pub mod change_set;
pub mod matching;
pub mod tracking_mutator;

pub use tracking_mutator::TrackingSchemaMutator;
