// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery ledger for the Tianshu bridge hub.
//!
//! Every outbound business delivery is recorded as `pending` when it starts
//! and completed once with its outcome. The ledger is a best-effort audit
//! trail: bounded, in memory, and queried by ops tooling.

pub mod ledger;
pub mod ops;

pub use ledger::{DeliveryLog, DeliveryPage, DeliveryQuery, DeliveryRecord, InMemoryLedger};
pub use ops::{DeliverySummary, delivery_summary};
