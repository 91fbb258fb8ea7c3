mod level_period;
mod manager;
mod ordering;
mod store;
mod vdf_message;

pub use level_period::level_to_period;
pub use manager::{AddBlockOutcome, DagManager, ExpiryOutcome};
pub use ordering::{dag_block_order, ghost_path, order_hash};
pub use store::DagStore;
pub use vdf_message::{sortition_input, vdf_message};
