//! Test and helper mocks for loadcell_core

use loadcell_traits::{BoxError, FanOut};

use crate::persistence::{OrderHeader, RecordStore, RmTargetRow, WeightRecordRow};

/// A store whose every write fails; useful for checking that persistence
/// errors never reach the workflow.
#[derive(Debug, Default)]
pub struct FailingStore;

impl RecordStore for FailingStore {
    fn save_order(&mut self, _header: &OrderHeader) -> Result<u64, BoxError> {
        Err(Box::new(std::io::Error::other("store unavailable")))
    }
    fn save_rm_target(&mut self, _order_id: u64, _row: &RmTargetRow) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("store unavailable")))
    }
    fn save_weight(&mut self, _row: &WeightRecordRow) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("store unavailable")))
    }
}

/// Fan-out that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SinkFanOut;

impl FanOut for SinkFanOut {
    fn emit(&mut self, _event: &str, _payload: &str) -> Result<(), BoxError> {
        Ok(())
    }
}
