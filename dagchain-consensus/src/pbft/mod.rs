mod manager;
mod round;

pub use manager::{PbftManager, PbftRoundRecord, StepOutcome};
pub use round::RoundState;
