//! Best-effort record keeping for confirmed orders and weighings.
//!
//! Store failures are logged and counted; they never reach the workflow.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use loadcell_traits::BoxError;
use serde::Serialize;

use crate::error::WeighError;
use crate::workflow::{OrderPlan, WeighRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderHeader {
    pub nomor_mo: String,
    pub qty_plan: u32,
    pub lot: u32,
    pub total_rm: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmTargetRow {
    pub item: String,
    pub qty: f64,
    pub target_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightRecordRow {
    /// `None` when the order header could not be stored.
    pub mo_id: Option<u64>,
    pub nomor_mo: String,
    pub lot: u32,
    pub rm_index: usize,
    pub rm_item: String,
    pub target_weight: f64,
    pub actual_weight: f64,
    pub timestamp: String,
}

pub trait RecordStore {
    /// Store an order header and return its id.
    fn save_order(&mut self, header: &OrderHeader) -> Result<u64, BoxError>;
    fn save_rm_target(&mut self, order_id: u64, row: &RmTargetRow) -> Result<(), BoxError>;
    fn save_weight(&mut self, row: &WeightRecordRow) -> Result<(), BoxError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn save_order(&mut self, header: &OrderHeader) -> Result<u64, BoxError> {
        (**self).save_order(header)
    }
    fn save_rm_target(&mut self, order_id: u64, row: &RmTargetRow) -> Result<(), BoxError> {
        (**self).save_rm_target(order_id, row)
    }
    fn save_weight(&mut self, row: &WeightRecordRow) -> Result<(), BoxError> {
        (**self).save_weight(row)
    }
}

/// Discards everything; ids still increase.
#[derive(Debug, Default)]
pub struct NullStore {
    next_id: u64,
}

impl RecordStore for NullStore {
    fn save_order(&mut self, _header: &OrderHeader) -> Result<u64, BoxError> {
        self.next_id += 1;
        Ok(self.next_id)
    }
    fn save_rm_target(&mut self, _order_id: u64, _row: &RmTargetRow) -> Result<(), BoxError> {
        Ok(())
    }
    fn save_weight(&mut self, _row: &WeightRecordRow) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Order {
        id: u64,
        #[serde(flatten)]
        header: &'a OrderHeader,
    },
    RmTarget {
        order_id: u64,
        #[serde(flatten)]
        row: &'a RmTargetRow,
    },
    Weight {
        #[serde(flatten)]
        row: &'a WeightRecordRow,
    },
}

/// Append-only JSON-lines file, one record per line with a `kind` field.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    file: File,
    next_id: u64,
}

impl JsonlStore {
    /// Open (or create) `path`. Order ids continue after those already in
    /// the file.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let existing = match File::open(&path) {
            Ok(f) => BufReader::new(f)
                .lines()
                .map_while(Result::ok)
                .filter(|l| l.contains(r#""kind":"order""#))
                .count() as u64,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            next_id: existing + 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &Line<'_>) -> Result<(), BoxError> {
        let mut buf = serde_json::to_vec(line)?;
        buf.push(b'\n');
        self.file.write_all(&buf)?;
        self.file.flush()?;
        Ok(())
    }
}

impl RecordStore for JsonlStore {
    fn save_order(&mut self, header: &OrderHeader) -> Result<u64, BoxError> {
        let id = self.next_id;
        self.write_line(&Line::Order { id, header })?;
        self.next_id += 1;
        Ok(id)
    }

    fn save_rm_target(&mut self, order_id: u64, row: &RmTargetRow) -> Result<(), BoxError> {
        self.write_line(&Line::RmTarget { order_id, row })
    }

    fn save_weight(&mut self, row: &WeightRecordRow) -> Result<(), BoxError> {
        self.write_line(&Line::Weight { row })
    }
}

/// Wraps a store so failures are logged as `PersistenceFailed` and counted.
pub struct BestEffort {
    store: Box<dyn RecordStore + Send>,
    failures: u64,
}

impl std::fmt::Debug for BestEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestEffort")
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl BestEffort {
    pub fn new(store: Box<dyn RecordStore + Send>) -> Self {
        Self { store, failures: 0 }
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn absorb(&mut self, what: &str, e: &BoxError) {
        self.failures += 1;
        let err = WeighError::PersistenceFailed(e.to_string());
        tracing::warn!(record = what, error = %err, "record not stored");
    }

    /// Store the header and one target row per RM. Returns the order id when
    /// the header was stored.
    pub fn record_plan(&mut self, plan: &OrderPlan, created_at: &str) -> Option<u64> {
        let header = OrderHeader {
            nomor_mo: plan.mo_identifier.clone(),
            qty_plan: plan.total_lots_planned,
            lot: plan.lot_start,
            total_rm: plan.rm_items.len(),
            created_at: created_at.to_string(),
        };
        let order_id = match self.store.save_order(&header) {
            Ok(id) => id,
            Err(e) => {
                self.absorb("order", &e);
                return None;
            }
        };
        for (rm, target) in plan.rm_items.iter().zip(&plan.target_weights) {
            let row = RmTargetRow {
                item: rm.name.clone(),
                qty: rm.qty,
                target_weight: *target,
            };
            if let Err(e) = self.store.save_rm_target(order_id, &row) {
                self.absorb("rm_target", &e);
            }
        }
        Some(order_id)
    }

    pub fn record_weight(&mut self, order_id: Option<u64>, record: &WeighRecord, timestamp: &str) {
        let row = WeightRecordRow {
            mo_id: order_id,
            nomor_mo: record.mo_identifier.clone(),
            lot: record.lot,
            rm_index: record.rm_index,
            rm_item: record.rm_name.clone(),
            target_weight: record.target,
            actual_weight: record.actual_weight,
            timestamp: timestamp.to_string(),
        };
        if let Err(e) = self.store.save_weight(&row) {
            self.absorb("weight", &e);
        }
    }
}
