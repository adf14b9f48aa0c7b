// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregates over the ledger for ops tooling.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ledger::DeliveryLog;

/// Ids of the newest records included in a summary.
pub const SAMPLE_SIZE: usize = 10;

/// Status counts over the latest records of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    /// Records examined.
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Newest first.
    pub sample_delivery_ids: Vec<String>,
}

/// Summarizes the latest `limit` records.
pub fn delivery_summary(log: &dyn DeliveryLog, limit: usize) -> DeliverySummary {
    let records = log.recent(limit);
    let mut by_status = BTreeMap::new();
    for record in &records {
        *by_status.entry(record.status.to_string()).or_insert(0) += 1;
    }
    DeliverySummary {
        total: records.len(),
        by_status,
        sample_delivery_ids: records
            .iter()
            .take(SAMPLE_SIZE)
            .map(|r| r.delivery_id.clone())
            .collect(),
    }
}
