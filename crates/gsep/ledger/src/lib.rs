//! Audit ledger for governed transitions.
//!
//! Every fully evaluated transition, certified or rejected, becomes one
//! [`LedgerRecord`]: the [`LedgerEntry`] plus its sequence number, the hash
//! of the previous record, its own record hash and a keyed seal. Records are
//! never updated or deleted.
//!
//! An optional [`LedgerSink`] persists each record before it becomes
//! visible; [`JsonLinesSink`] is the file-backed journal and
//! [`AuditLedger::replay`] rebuilds a verified ledger from it.

pub mod entry;
pub mod error;
pub mod ledger;
pub mod seal;
pub mod sink;

pub use entry::{LedgerAck, LedgerEntry, LedgerRecord};
pub use error::{LedgerError, LedgerResult};
pub use ledger::AuditLedger;
pub use seal::{KeyedSealer, RecordSealer};
pub use sink::{JsonLinesSink, LedgerSink};
