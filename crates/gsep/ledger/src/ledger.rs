use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gsep_types::{canonical_json, TransitionHash};
use tracing::{debug, info, warn};

use crate::entry::{LedgerAck, LedgerEntry, LedgerRecord};
use crate::error::{LedgerError, LedgerResult};
use crate::seal::{KeyedSealer, RecordSealer};
use crate::sink::LedgerSink;

/// Append-only audit ledger.
///
/// Each transition hash is recorded at most once. The hash index is claimed
/// through the `DashMap` entry API, so two concurrent appends of the same
/// hash yield one record and one [`LedgerError::Duplicate`]. Records are
/// chained by `previous_hash` and sealed by the configured [`RecordSealer`].
///
/// Lock order: index shard, then chain, then sink.
pub struct AuditLedger {
    index: DashMap<TransitionHash, u64>,
    chain: Mutex<Vec<LedgerRecord>>,
    sealer: Arc<dyn RecordSealer>,
    sink: Option<Arc<dyn LedgerSink>>,
}

impl AuditLedger {
    pub fn new(sealer: Arc<dyn RecordSealer>) -> Self {
        Self {
            index: DashMap::new(),
            chain: Mutex::new(Vec::new()),
            sealer,
            sink: None,
        }
    }

    /// Memory-only ledger with an ephemeral sealer.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(KeyedSealer::ephemeral("in-memory")))
    }

    pub fn with_sink(mut self, sink: Arc<dyn LedgerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Rebuild a ledger from previously persisted records.
    ///
    /// The chain, every seal and hash uniqueness are verified before the
    /// ledger is returned.
    pub fn replay(
        records: Vec<LedgerRecord>,
        sealer: Arc<dyn RecordSealer>,
        sink: Option<Arc<dyn LedgerSink>>,
    ) -> LedgerResult<Self> {
        verify_records(&records, sealer.as_ref())?;

        let index = DashMap::with_capacity(records.len());
        for record in &records {
            if index
                .insert(record.transition_hash(), record.sequence)
                .is_some()
            {
                return Err(LedgerError::IntegrityViolation {
                    seq: record.sequence,
                    reason: format!("transition {} recorded twice", record.transition_hash()),
                });
            }
        }

        info!(records = records.len(), "audit ledger replayed");
        Ok(Self {
            index,
            chain: Mutex::new(records),
            sealer,
            sink,
        })
    }

    /// Append an entry. Fails with [`LedgerError::Duplicate`] if its
    /// transition hash is already recorded, and with
    /// [`LedgerError::InvalidEntry`] if a score is not finite.
    pub fn append(&self, entry: LedgerEntry) -> LedgerResult<LedgerAck> {
        let transition_hash = entry.transition_hash;
        ensure_finite(&entry)?;

        let slot = match self.index.entry(transition_hash) {
            Entry::Occupied(_) => {
                debug!(transition = %transition_hash.short(), "duplicate append refused");
                return Err(LedgerError::Duplicate(transition_hash));
            }
            Entry::Vacant(slot) => slot,
        };

        let mut chain = self.lock_chain()?;
        let previous_hash = chain.last().map(|r| r.record_hash.clone());
        let sequence = chain.len() as u64 + 1;
        let record_hash = compute_record_hash(&entry, previous_hash.as_deref(), sequence)?;
        let seal = self.sealer.seal(&record_hash);

        let record = LedgerRecord {
            sequence,
            entry,
            previous_hash,
            record_hash,
            seal,
            sealer_id: self.sealer.sealer_id().to_string(),
        };

        if let Some(sink) = &self.sink {
            sink.persist(&record)?;
        }

        let ack = LedgerAck {
            sequence,
            transition_hash,
            record_hash: record.record_hash.clone(),
        };
        info!(
            sequence,
            transition = %transition_hash.short(),
            pass = record.entry.pass,
            "ledger entry appended"
        );
        chain.push(record);
        slot.insert(sequence);
        Ok(ack)
    }

    pub fn contains(&self, transition_hash: &TransitionHash) -> bool {
        self.index.contains_key(transition_hash)
    }

    pub fn get(&self, transition_hash: &TransitionHash) -> LedgerResult<Option<LedgerRecord>> {
        let Some(sequence) = self.index.get(transition_hash).map(|seq| *seq) else {
            return Ok(None);
        };
        let chain = self.lock_chain()?;
        Ok(chain.get(sequence as usize - 1).cloned())
    }

    /// All records in append order.
    pub fn records(&self) -> LedgerResult<Vec<LedgerRecord>> {
        Ok(self.lock_chain()?.clone())
    }

    pub fn head(&self) -> LedgerResult<Option<LedgerRecord>> {
        Ok(self.lock_chain()?.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Re-derive every record hash and check links and seals.
    pub fn verify_chain(&self) -> LedgerResult<()> {
        let chain = self.lock_chain()?;
        verify_records(&chain, self.sealer.as_ref()).inspect_err(|err| {
            warn!(error = %err, "ledger chain verification failed");
        })
    }

    fn lock_chain(&self) -> LedgerResult<MutexGuard<'_, Vec<LedgerRecord>>> {
        self.chain
            .lock()
            .map_err(|_| LedgerError::Backend("ledger chain lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn tamper<F: FnOnce(&mut Vec<LedgerRecord>)>(&self, f: F) {
        f(&mut self.chain.lock().unwrap());
    }
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("records", &self.index.len())
            .field("sealer", &self.sealer.sealer_id())
            .field("persistent", &self.sink.is_some())
            .finish()
    }
}

/// JSON has no representation for non-finite floats.
fn ensure_finite(entry: &LedgerEntry) -> LedgerResult<()> {
    for (field, value) in [
        ("S01", entry.s01),
        ("S02", entry.s02),
        ("epsilon", entry.epsilon),
    ] {
        if !value.is_finite() {
            warn!(transition = %entry.transition_hash.short(), field, "non-finite score refused");
            return Err(LedgerError::InvalidEntry(format!(
                "{field} is not a finite number: {value}"
            )));
        }
    }
    Ok(())
}

fn verify_records(records: &[LedgerRecord], sealer: &dyn RecordSealer) -> LedgerResult<()> {
    for (index, record) in records.iter().enumerate() {
        let expected_seq = index as u64 + 1;
        if record.sequence != expected_seq {
            return Err(LedgerError::IntegrityViolation {
                seq: record.sequence,
                reason: format!("expected seq {}, found {}", expected_seq, record.sequence),
            });
        }

        let expected_prev = index
            .checked_sub(1)
            .map(|prev| records[prev].record_hash.as_str());
        if record.previous_hash.as_deref() != expected_prev {
            return Err(LedgerError::IntegrityViolation {
                seq: record.sequence,
                reason: "previous hash link mismatch".into(),
            });
        }

        let computed =
            compute_record_hash(&record.entry, record.previous_hash.as_deref(), record.sequence)?;
        if computed != record.record_hash {
            return Err(LedgerError::IntegrityViolation {
                seq: record.sequence,
                reason: "record hash mismatch".into(),
            });
        }

        if !sealer.verify(&record.record_hash, &record.seal) {
            return Err(LedgerError::IntegrityViolation {
                seq: record.sequence,
                reason: format!("seal rejected (sealed by {})", record.sealer_id),
            });
        }
    }
    Ok(())
}

fn compute_record_hash(
    entry: &LedgerEntry,
    previous_hash: Option<&str>,
    sequence: u64,
) -> LedgerResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "entry": serde_json::to_value(entry)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?,
    });
    Ok(blake3::hash(canonical_json(&serializable).as_bytes())
        .to_hex()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(tag: &str, pass: bool) -> LedgerEntry {
        LedgerEntry {
            transition_hash: TransitionHash::digest("test", tag.as_bytes()),
            s01: 0.8,
            s02: 0.7,
            epsilon: 0.05,
            pass,
            timestamp: Utc::now(),
            certifying_module: "finality".into(),
        }
    }

    #[test]
    fn append_chains_records() {
        let ledger = AuditLedger::in_memory();
        let a = ledger.append(entry("a", true)).unwrap();
        let b = ledger.append(entry("b", false)).unwrap();
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);

        let records = ledger.records().unwrap();
        assert_eq!(records[0].previous_hash, None);
        assert_eq!(records[1].previous_hash.as_deref(), Some(a.record_hash.as_str()));
        assert_eq!(ledger.head().unwrap().unwrap().record_hash, b.record_hash);
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn duplicate_hash_is_refused() {
        let ledger = AuditLedger::in_memory();
        let first = entry("a", true);
        let hash = first.transition_hash;
        ledger.append(first).unwrap();

        let err = ledger.append(entry("a", false)).unwrap_err();
        assert_eq!(err, LedgerError::Duplicate(hash));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(&hash).unwrap().unwrap().entry.pass);
    }

    #[test]
    fn lookup_by_hash() {
        let ledger = AuditLedger::in_memory();
        ledger.append(entry("a", true)).unwrap();
        let b = entry("b", true);
        let hash = b.transition_hash;
        ledger.append(b).unwrap();

        assert!(ledger.contains(&hash));
        assert_eq!(ledger.get(&hash).unwrap().unwrap().sequence, 2);
        let missing = TransitionHash::digest("test", b"zzz");
        assert!(ledger.get(&missing).unwrap().is_none());
    }

    #[test]
    fn tampered_entry_breaks_chain() {
        let ledger = AuditLedger::in_memory();
        ledger.append(entry("a", false)).unwrap();
        ledger.append(entry("b", true)).unwrap();
        ledger.tamper(|chain| chain[0].entry.pass = true);

        let err = ledger.verify_chain().unwrap_err();
        assert_eq!(
            err,
            LedgerError::IntegrityViolation {
                seq: 1,
                reason: "record hash mismatch".into()
            }
        );
    }

    #[test]
    fn forged_seal_is_detected() {
        let ledger = AuditLedger::in_memory();
        ledger.append(entry("a", true)).unwrap();
        ledger.tamper(|chain| chain[0].seal = "00".repeat(32));

        assert!(matches!(
            ledger.verify_chain().unwrap_err(),
            LedgerError::IntegrityViolation { seq: 1, .. }
        ));
    }

    #[test]
    fn replay_restores_index() {
        let sealer: Arc<dyn RecordSealer> = Arc::new(KeyedSealer::new("finality", b"k"));
        let ledger = AuditLedger::new(sealer.clone());
        let a = entry("a", true);
        let hash = a.transition_hash;
        ledger.append(a).unwrap();
        ledger.append(entry("b", true)).unwrap();

        let restored = AuditLedger::replay(ledger.records().unwrap(), sealer, None).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(matches!(
            restored.append(entry("a", true)),
            Err(LedgerError::Duplicate(h)) if h == hash
        ));
        let c = restored.append(entry("c", true)).unwrap();
        assert_eq!(c.sequence, 3);
        restored.verify_chain().unwrap();
    }

    #[test]
    fn replay_with_wrong_key_fails() {
        let ledger = AuditLedger::new(Arc::new(KeyedSealer::new("finality", b"k")));
        ledger.append(entry("a", true)).unwrap();

        let other: Arc<dyn RecordSealer> = Arc::new(KeyedSealer::new("finality", b"other"));
        assert!(AuditLedger::replay(ledger.records().unwrap(), other, None).is_err());
    }

    #[test]
    fn non_finite_scores_are_refused() {
        let ledger = AuditLedger::in_memory();
        let mut overflowed = entry("inf", true);
        overflowed.s01 = f64::INFINITY;
        assert!(matches!(
            ledger.append(overflowed).unwrap_err(),
            LedgerError::InvalidEntry(_)
        ));

        let mut undefined = entry("nan", false);
        undefined.s02 = f64::NAN;
        let hash = undefined.transition_hash;
        assert!(matches!(
            ledger.append(undefined).unwrap_err(),
            LedgerError::InvalidEntry(_)
        ));
        assert!(!ledger.contains(&hash));
        assert!(ledger.is_empty());
    }

    struct FailingSink;

    impl LedgerSink for FailingSink {
        fn persist(&self, _record: &LedgerRecord) -> LedgerResult<()> {
            Err(LedgerError::Io("disk full".into()))
        }
    }

    #[test]
    fn sink_failure_leaves_no_entry() {
        let ledger = AuditLedger::in_memory().with_sink(Arc::new(FailingSink));
        let a = entry("a", true);
        let hash = a.transition_hash;

        assert_eq!(
            ledger.append(a).unwrap_err(),
            LedgerError::Io("disk full".into())
        );
        assert!(!ledger.contains(&hash));
        assert!(ledger.is_empty());
        assert!(ledger.records().unwrap().is_empty());
    }
}
