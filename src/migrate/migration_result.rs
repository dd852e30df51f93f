use uuid::Uuid;

use crate::audit::Direction;
use crate::history::baseline::BaselineOutcome;

#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub run_id: Uuid,
    pub direction: Direction,
    pub baseline: Option<BaselineOutcome>,
    pub executed: Vec<String>,
    pub warned: Vec<String>,
}

impl MigrationResult {
    pub fn new(run_id: Uuid, direction: Direction) -> Self {
        MigrationResult {
            run_id,
            direction,
            baseline: None,
            executed: Vec::new(),
            warned: Vec::new(),
        }
    }
}
