pub mod histogram;
pub mod join_optimizer;
pub mod table_stats;

pub use histogram::IntHistogram;
pub use join_optimizer::{CostCard, JoinOptimizer, LogicalJoinNode};
pub use table_stats::{TableStats, NUM_HIST_BINS};
