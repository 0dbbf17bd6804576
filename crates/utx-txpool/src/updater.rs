//! Batch updater
//!
//! Orchestrates admission of transaction batches into the unconfirmed
//! transactions cache.
//!
//! ```text
//!   update_new / update_after_commit
//!                |
//!        +---------------+   fee check -> throttle -> duplicate check
//!        |   UtUpdater   |   -> execution pipeline -> cache insert
//!        +---------------+
//!          |     |     |
//!      UtCache  sink  ExecutionPipeline
//! ```
//!
//! A single writer lock (held around the execution pipeline) serializes every
//! mutation, so the cache size and per-signer counts read for the throttle
//! cannot be perturbed by another batch. Readers go to the cache directly.
//!
//! The pipeline's working view is pinned to the confirmed height of its last
//! rebase. While the confirmed state has moved past that height, new
//! transactions are admitted without execution and get validated by the next
//! `update_after_commit`.

use crate::cache::UtCache;
use crate::config::UtConfig;
use crate::metrics::UpdaterMetrics;
use crate::result::{aggregate, BatchOutcome, BatchSummary, DeferReason, RejectReason};
use crate::throttle::{ImportanceView, ThrottleSnapshot, TransactionSource, TransactionThrottle};
use crate::validator::{ExecutionContext, ExecutionPipeline, ValidationResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use utx_primitives::{BlockFeeMultiplier, Hash256, Height, Importance, PublicKey, Timestamp};
use utx_types::TransactionInfo;

/// Read-only view of the confirmed ledger state
pub trait ConfirmedState: Send + Sync {
    /// Height of the last confirmed block
    fn height(&self) -> Height;

    /// Importance of `key` at `height`; zero for unknown accounts
    fn importance(&self, key: &PublicKey, height: Height) -> Importance;
}

/// Receives every rejected transaction, in batch order
///
/// Rejections are forwarded after the writer lock is released, so a sink may
/// submit to the same updater.
pub trait FailureSink: Send + Sync {
    /// Called once per rejected transaction
    fn on_rejected(&self, info: TransactionInfo, reason: RejectReason);
}

impl<F> FailureSink for F
where
    F: Fn(TransactionInfo, RejectReason) + Send + Sync,
{
    fn on_rejected(&self, info: TransactionInfo, reason: RejectReason) {
        self(info, reason)
    }
}

/// Supplies the block time used for validation
pub type TimeSupplier = Box<dyn Fn() -> Timestamp + Send + Sync>;

struct ConfirmedImportances<'a>(&'a dyn ConfirmedState);

impl ImportanceView for ConfirmedImportances<'_> {
    fn importance(&self, key: &PublicKey, height: Height) -> Importance {
        self.0.importance(key, height)
    }
}

/// Cache size and per-signer counts, read at the start of a batch and
/// advanced only by the batch's own insertions
struct BatchTally<'a> {
    cache: &'a dyn UtCache,
    cache_size: usize,
    signer_counts: HashMap<PublicKey, usize>,
}

impl<'a> BatchTally<'a> {
    fn new(cache: &'a dyn UtCache) -> Self {
        Self {
            cache,
            cache_size: cache.len(),
            signer_counts: HashMap::new(),
        }
    }

    fn signer_count(&mut self, signer: &PublicKey) -> usize {
        let cache = self.cache;
        *self
            .signer_counts
            .entry(*signer)
            .or_insert_with(|| cache.count_for_signer(signer))
    }

    fn record_insert(&mut self, signer: &PublicKey) {
        self.cache_size += 1;
        if let Some(count) = self.signer_counts.get_mut(signer) {
            *count += 1;
        }
    }
}

fn system_time() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    Timestamp::new(millis)
}

/// Execution pipeline plus the confirmed height its working view was built on
struct WorkingView {
    pipeline: Box<dyn ExecutionPipeline>,
    height: Height,
}

type Rejections = Vec<(TransactionInfo, RejectReason)>;

/// Applies batches of transactions to an unconfirmed transactions cache
pub struct UtUpdater {
    cache: Arc<dyn UtCache>,
    state: Arc<dyn ConfirmedState>,
    throttle: Box<dyn TransactionThrottle>,
    sink: Box<dyn FailureSink>,
    time_supplier: TimeSupplier,
    min_fee_multiplier: BlockFeeMultiplier,
    /// Writer lock; also owns the pipeline's working ledger view
    view: Mutex<WorkingView>,
    metrics: Arc<UpdaterMetrics>,
}

impl UtUpdater {
    /// Create an updater with the throttle selected by `config`
    pub fn new(
        config: &UtConfig,
        cache: Arc<dyn UtCache>,
        state: Arc<dyn ConfirmedState>,
        pipeline: Box<dyn ExecutionPipeline>,
        sink: Box<dyn FailureSink>,
    ) -> Self {
        let height = state.height();
        Self {
            cache,
            state,
            throttle: config.create_throttle(),
            sink,
            time_supplier: Box::new(system_time),
            min_fee_multiplier: config.min_fee_multiplier,
            view: Mutex::new(WorkingView { pipeline, height }),
            metrics: Arc::new(UpdaterMetrics::new()),
        }
    }

    /// Replace the throttle
    pub fn with_throttle(mut self, throttle: Box<dyn TransactionThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Replace the time supplier
    pub fn with_time_supplier(mut self, time_supplier: TimeSupplier) -> Self {
        self.time_supplier = time_supplier;
        self
    }

    /// Get the cache
    pub fn cache(&self) -> &Arc<dyn UtCache> {
        &self.cache
    }

    /// Get the metrics
    pub fn metrics(&self) -> Arc<UpdaterMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Offer freshly submitted transactions
    pub fn update_new(&self, infos: Vec<TransactionInfo>) -> BatchSummary {
        let (outcomes, rejections) = {
            let mut view = self.view.lock();
            let entries = infos.into_iter().map(|info| (info, TransactionSource::New)).collect();
            self.apply(&mut view, entries)
        };

        self.forward_rejections(rejections);
        aggregate(&outcomes)
    }

    /// Reconcile the cache with a newly committed block.
    ///
    /// Confirmed transactions are evicted, the pipeline is rebased onto the new
    /// confirmed state, and then `reverted_infos` followed by every remaining
    /// resident are re-validated in one batch.
    pub fn update_after_commit(&self, confirmed_hashes: &[Hash256], reverted_infos: Vec<TransactionInfo>) -> BatchSummary {
        let mut view = self.view.lock();

        let evicted = confirmed_hashes
            .iter()
            .filter_map(|hash| self.cache.remove(hash))
            .count();

        let residents = self.cache.remove_all();
        view.pipeline.rebase();
        view.height = self.state.height();

        let reverted_count = reverted_infos.len();
        let resident_count = residents.len();
        debug!(
            "Rebasing unconfirmed cache: evicted={}, reverted={}, residents={}",
            evicted, reverted_count, resident_count
        );

        let entries = reverted_infos
            .into_iter()
            .map(|info| (info, TransactionSource::Reverted))
            .chain(residents.into_iter().map(|info| (info, TransactionSource::Existing)))
            .collect();
        let (outcomes, rejections) = self.apply(&mut view, entries);
        drop(view);

        let dropped = outcomes[reverted_count..]
            .iter()
            .filter(|outcome| !outcome.is_success_like())
            .count();
        if dropped > 0 {
            warn!("Rebase dropped {} of {} resident transactions", dropped, resident_count);
        }

        self.forward_rejections(rejections);
        aggregate(&outcomes)
    }

    /// Remove every cached transaction with a deadline before `timestamp`
    pub fn prune(&self, timestamp: Timestamp) -> Vec<TransactionInfo> {
        let _view = self.view.lock();

        let pruned = self.cache.prune(timestamp);
        let cache_size = self.cache.len();
        if !pruned.is_empty() {
            info!("Pruned {} expired transactions, cache size {}", pruned.len(), cache_size);
        }

        self.metrics.record_prune(pruned.len(), cache_size);
        pruned
    }

    fn forward_rejections(&self, rejections: Rejections) {
        for (info, reason) in rejections {
            self.sink.on_rejected(info, reason);
        }
    }

    fn apply(
        &self,
        view: &mut WorkingView,
        entries: Vec<(TransactionInfo, TransactionSource)>,
    ) -> (Vec<BatchOutcome>, Rejections) {
        let start = Instant::now();
        let height = self.state.height();
        let mut pipeline = if view.height == height {
            Some(&mut view.pipeline)
        } else {
            debug!(
                "Working view at height {} is stale (confirmed {}), skipping validation",
                view.height, height
            );
            None
        };
        let context = ExecutionContext {
            height: height.saturating_add(Height::new(1)),
            block_time: (self.time_supplier)(),
        };
        let importances = ConfirmedImportances(self.state.as_ref());
        let mut tally = BatchTally::new(self.cache.as_ref());

        let mut outcomes = Vec::with_capacity(entries.len());
        let mut rejected = Vec::new();
        for (info, source) in entries {
            let outcome = self.process(
                pipeline.as_deref_mut(),
                &info,
                source,
                height,
                &context,
                &importances,
                &mut tally,
            );
            match outcome {
                BatchOutcome::Admitted => {}
                BatchOutcome::Deferred(reason) => {
                    debug!("Deferred {}: {}", info.entity_hash.short_hex(), reason);
                }
                BatchOutcome::Rejected(reason) => {
                    debug!("Rejected {}: {}", info.entity_hash.short_hex(), reason);
                    rejected.push((info, reason));
                }
            }

            outcomes.push(outcome);
        }

        let summary = aggregate(&outcomes);
        let cache_size = self.cache.len();
        info!(
            "Applied batch of {}: admitted={}, deferred={}, rejected={}, cache size {}",
            outcomes.len(),
            summary.admitted,
            summary.deferred,
            summary.rejected,
            cache_size
        );

        self.metrics.record_batch(&summary, start.elapsed(), cache_size);
        (outcomes, rejected)
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        pipeline: Option<&mut Box<dyn ExecutionPipeline>>,
        info: &TransactionInfo,
        source: TransactionSource,
        height: Height,
        context: &ExecutionContext,
        importances: &ConfirmedImportances<'_>,
        tally: &mut BatchTally<'_>,
    ) -> BatchOutcome {
        if !info.entity.pays_at_least(self.min_fee_multiplier) {
            return BatchOutcome::Rejected(RejectReason::FeeTooLow {
                multiplier: info.entity.fee_multiplier(),
                minimum: self.min_fee_multiplier,
            });
        }

        let snapshot = ThrottleSnapshot {
            source,
            height,
            cache_size: tally.cache_size,
            signer_count: tally.signer_count(info.signer()),
            importances,
        };
        if self.throttle.is_throttled(info, &snapshot) {
            return BatchOutcome::Deferred(DeferReason::Throttled);
        }

        // never execute duplicates
        if self.cache.contains(&info.entity_hash) {
            return BatchOutcome::Deferred(DeferReason::AlreadyPresent);
        }

        // a stale view defers validation to the next rebase
        if let Some(pipeline) = pipeline {
            match pipeline.execute(info, context) {
                ValidationResult::Success => {}
                ValidationResult::Neutral(code) => return BatchOutcome::Deferred(DeferReason::Neutral(code)),
                ValidationResult::Failure(code) => {
                    return BatchOutcome::Rejected(RejectReason::ValidationFailed(code))
                }
            }
        }

        if !self.cache.add(info.clone()) {
            return BatchOutcome::Deferred(DeferReason::AlreadyPresent);
        }

        tally.record_insert(info.signer());
        BatchOutcome::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryUtCache;
    use crate::validator::ValidationCode;
    use bytes::Bytes;
    use std::sync::{OnceLock, Weak};
    use utx_primitives::Amount;
    use utx_types::{EntityType, Transaction};

    // ==================== Test Doubles ====================

    struct MockState {
        height: Mutex<Height>,
        importances: HashMap<PublicKey, Importance>,
    }

    impl ConfirmedState for MockState {
        fn height(&self) -> Height {
            *self.height.lock()
        }

        fn importance(&self, key: &PublicKey, _height: Height) -> Importance {
            self.importances.get(key).copied().unwrap_or(Importance::ZERO)
        }
    }

    #[derive(Default)]
    struct PipelineRecord {
        executed: Vec<Hash256>,
        contexts: Vec<ExecutionContext>,
        rebases: usize,
        results: HashMap<Hash256, ValidationResult>,
    }

    struct MockPipeline(Arc<Mutex<PipelineRecord>>);

    impl ExecutionPipeline for MockPipeline {
        fn execute(&mut self, info: &TransactionInfo, context: &ExecutionContext) -> ValidationResult {
            let mut record = self.0.lock();
            record.executed.push(info.entity_hash);
            record.contexts.push(*context);
            record
                .results
                .get(&info.entity_hash)
                .copied()
                .unwrap_or(ValidationResult::Success)
        }

        fn rebase(&mut self) {
            self.0.lock().rebases += 1;
        }
    }

    type SinkRecord = Arc<Mutex<Vec<(Hash256, RejectReason)>>>;

    struct TestContext {
        updater: UtUpdater,
        cache: Arc<MemoryUtCache>,
        state: Arc<MockState>,
        pipeline: Arc<Mutex<PipelineRecord>>,
        failures: SinkRecord,
    }

    impl TestContext {
        fn new(config: UtConfig, importances: &[(PublicKey, u64)]) -> Self {
            let cache = Arc::new(MemoryUtCache::new());
            let state = Arc::new(MockState {
                height: Mutex::new(Height::new(10)),
                importances: importances
                    .iter()
                    .map(|(key, importance)| (*key, Importance::new(*importance)))
                    .collect(),
            });
            let pipeline = Arc::new(Mutex::new(PipelineRecord::default()));
            let failures: SinkRecord = Arc::new(Mutex::new(Vec::new()));
            let sink_failures = Arc::clone(&failures);

            let updater = UtUpdater::new(
                &config,
                Arc::clone(&cache) as Arc<dyn UtCache>,
                Arc::clone(&state) as Arc<dyn ConfirmedState>,
                Box::new(MockPipeline(Arc::clone(&pipeline))),
                Box::new(move |info: TransactionInfo, reason: RejectReason| {
                    sink_failures.lock().push((info.entity_hash, reason));
                }),
            )
            .with_time_supplier(Box::new(|| Timestamp::new(5_000)));

            Self {
                updater,
                cache,
                state,
                pipeline,
                failures,
            }
        }

        fn set_result(&self, hash: Hash256, result: ValidationResult) {
            self.pipeline.lock().results.insert(hash, result);
        }

        fn advance_height(&self) {
            let mut height = self.state.height.lock();
            *height = height.saturating_add(Height::new(1));
        }

        fn executed(&self) -> Vec<Hash256> {
            self.pipeline.lock().executed.clone()
        }

        fn failures(&self) -> Vec<(Hash256, RejectReason)> {
            self.failures.lock().clone()
        }
    }

    fn throttle_config(max_cache_size: usize, max_block_size: usize) -> UtConfig {
        let mut config = UtConfig::default();
        config.max_cache_size = max_cache_size;
        config.spam_throttling.max_block_size = max_block_size;
        config.spam_throttling.total_importance = Importance::new(1_000_000);
        config.spam_throttling.max_boost_fee = Amount::new(10_000_000);
        config
    }

    fn test_signer(n: u8) -> PublicKey {
        PublicKey::from_bytes([n; 32])
    }

    fn test_hash(n: u32) -> Hash256 {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&n.to_be_bytes());
        bytes[31] = 0xAA;
        Hash256::from_bytes(bytes)
    }

    fn create_info(signer: PublicKey, hash: Hash256, max_fee: u64, deadline: u64) -> TransactionInfo {
        let tx = Transaction::new(
            EntityType::Transfer,
            signer,
            Amount::new(max_fee),
            Timestamp::new(deadline),
            Bytes::new(),
        );
        TransactionInfo::new(tx, hash, Hash256::ZERO)
    }

    fn simple_info(n: u32) -> TransactionInfo {
        create_info(test_signer(1), test_hash(n), 0, 10_000)
    }

    fn hashes(infos: &[TransactionInfo]) -> Vec<Hash256> {
        infos.iter().map(|info| info.entity_hash).collect()
    }

    // ==================== Apply New ====================

    #[test]
    fn test_update_new_admits_valid_transactions() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let infos: Vec<_> = (1..=3).map(simple_info).collect();

        let summary = context.updater.update_new(infos.clone());

        assert_eq!(summary, BatchSummary::new(3, 0, 0));
        assert_eq!(context.cache.hashes(), hashes(&infos));
        assert_eq!(context.executed(), hashes(&infos));
        assert!(context.failures().is_empty());
    }

    #[test]
    fn test_update_new_empty_batch() {
        let context = TestContext::new(UtConfig::default(), &[]);
        assert_eq!(context.updater.update_new(Vec::new()), BatchSummary::default());
        assert!(context.cache.is_empty());
    }

    #[test]
    fn test_update_new_mixed_batch() {
        let important = test_signer(1);
        let unimportant = test_signer(2);
        let context = TestContext::new(throttle_config(100, 1), &[(important, 1_000_000)]);

        let resident = create_info(important, test_hash(1), 0, 10_000);
        context.cache.add(resident.clone());

        let invalid = create_info(important, test_hash(2), 0, 10_000);
        let throttled = create_info(unimportant, test_hash(3), 0, 10_000);
        let valid = create_info(important, test_hash(4), 0, 10_000);
        context.set_result(invalid.entity_hash, ValidationResult::Failure(ValidationCode(0x8000_0001)));

        let summary = context
            .updater
            .update_new(vec![invalid.clone(), resident.clone(), throttled.clone(), valid.clone()]);

        assert_eq!(summary, BatchSummary::new(1, 2, 1));
        assert_eq!(
            context.failures(),
            vec![(
                invalid.entity_hash,
                RejectReason::ValidationFailed(ValidationCode(0x8000_0001))
            )]
        );
        assert_eq!(context.cache.hashes(), vec![resident.entity_hash, valid.entity_hash]);
        assert_eq!(context.executed(), vec![invalid.entity_hash, valid.entity_hash]);
    }

    #[test]
    fn test_update_new_fee_too_low_is_rejected_without_execution() {
        let mut config = UtConfig::default();
        config.min_fee_multiplier = BlockFeeMultiplier::new(10);
        let context = TestContext::new(config, &[]);

        // size is 128, so the minimum fee is 1280
        let cheap = create_info(test_signer(1), test_hash(1), 1_279, 10_000);
        let exact = create_info(test_signer(1), test_hash(2), 1_280, 10_000);

        let summary = context.updater.update_new(vec![cheap.clone(), exact.clone()]);

        assert_eq!(summary, BatchSummary::new(1, 0, 1));
        assert_eq!(context.executed(), vec![exact.entity_hash]);
        assert_eq!(
            context.failures(),
            vec![(
                cheap.entity_hash,
                RejectReason::FeeTooLow {
                    multiplier: BlockFeeMultiplier::new(9),
                    minimum: BlockFeeMultiplier::new(10),
                }
            )]
        );
    }

    #[test]
    fn test_update_new_neutral_is_deferred_and_not_reported() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let info = simple_info(1);
        context.set_result(info.entity_hash, ValidationResult::Neutral(ValidationCode(0x4000_0001)));

        let summary = context.updater.update_new(vec![info]);

        assert_eq!(summary, BatchSummary::new(0, 1, 0));
        assert!(context.cache.is_empty());
        assert!(context.failures().is_empty());
    }

    #[test]
    fn test_update_new_duplicate_in_batch_is_executed_once() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let info = simple_info(1);

        let summary = context.updater.update_new(vec![info.clone(), info.clone()]);

        assert_eq!(summary, BatchSummary::new(1, 1, 0));
        assert_eq!(context.executed(), vec![info.entity_hash]);
        assert_eq!(context.cache.len(), 1);
    }

    #[test]
    fn test_update_new_failures_reported_in_order() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let infos: Vec<_> = (1..=5).map(simple_info).collect();
        for n in [4, 2, 1] {
            context.set_result(test_hash(n), ValidationResult::Failure(ValidationCode(n)));
        }

        let summary = context.updater.update_new(infos);

        assert_eq!(summary, BatchSummary::new(2, 0, 3));
        let reported: Vec<Hash256> = context.failures().into_iter().map(|(hash, _)| hash).collect();
        assert_eq!(reported, vec![test_hash(1), test_hash(2), test_hash(4)]);
    }

    #[test]
    fn test_update_new_execution_context() {
        let context = TestContext::new(UtConfig::default(), &[]);
        context.updater.update_new(vec![simple_info(1)]);

        let contexts = context.pipeline.lock().contexts.clone();
        assert_eq!(
            contexts,
            vec![ExecutionContext {
                height: Height::new(11),
                block_time: Timestamp::new(5_000),
            }]
        );
    }

    #[test]
    fn test_update_new_skips_validation_when_view_is_stale() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let info = simple_info(1);
        context.set_result(info.entity_hash, ValidationResult::Failure(ValidationCode(3)));
        context.advance_height();

        let summary = context.updater.update_new(vec![info.clone()]);

        assert_eq!(summary, BatchSummary::new(1, 0, 0));
        assert!(context.executed().is_empty());
        assert!(context.failures().is_empty());
        assert_eq!(context.cache.hashes(), vec![info.entity_hash]);

        // the next rebase validates it against the new state
        let summary = context.updater.update_after_commit(&[], Vec::new());
        assert_eq!(summary, BatchSummary::new(0, 0, 1));
        assert_eq!(context.executed(), vec![info.entity_hash]);
        assert_eq!(context.pipeline.lock().contexts[0].height, Height::new(12));
        assert!(context.cache.is_empty());
    }

    #[test]
    fn test_update_new_stale_view_still_applies_admission_checks() {
        let mut config = throttle_config(2, 1);
        config.enable_spam_throttling = false;
        config.min_fee_multiplier = BlockFeeMultiplier::new(10);
        let context = TestContext::new(config, &[]);
        let resident = create_info(test_signer(1), test_hash(1), 1_280, 10_000);
        context.updater.update_new(vec![resident.clone()]);
        context.advance_height();

        let cheap = create_info(test_signer(1), test_hash(2), 0, 10_000);
        let valid = create_info(test_signer(1), test_hash(3), 1_280, 10_000);
        let overflow = create_info(test_signer(1), test_hash(4), 1_280, 10_000);
        let summary = context
            .updater
            .update_new(vec![cheap.clone(), resident.clone(), valid.clone(), overflow]);

        assert_eq!(summary, BatchSummary::new(1, 2, 1));
        assert_eq!(context.executed(), vec![resident.entity_hash]);
        assert_eq!(context.cache.hashes(), vec![resident.entity_hash, valid.entity_hash]);
        assert_eq!(context.failures().len(), 1);
        assert_eq!(context.failures()[0].0, cheap.entity_hash);
    }

    // ==================== Throttling ====================

    #[test]
    fn test_capacity_only_never_exceeds_bound() {
        let mut config = throttle_config(3, 1);
        config.enable_spam_throttling = false;
        let context = TestContext::new(config, &[]);

        let summary = context.updater.update_new((1..=5).map(simple_info).collect());

        assert_eq!(summary, BatchSummary::new(3, 2, 0));
        assert_eq!(context.cache.len(), 3);
        assert_eq!(context.executed().len(), 3);
    }

    #[test]
    fn test_batch_tally_single_account() {
        let signer = test_signer(1);
        let context = TestContext::new(throttle_config(1_200, 120), &[(signer, 1_000)]);
        let infos = (0..200).map(|n| create_info(signer, test_hash(n), 0, 10_000)).collect();

        let summary = context.updater.update_new(infos);

        assert_eq!(summary, BatchSummary::new(120, 80, 0));
        assert_eq!(context.cache.count_for_signer(&signer), 120);
    }

    #[test]
    fn test_batch_tally_multiple_accounts() {
        let mut importances = Vec::new();
        let mut infos = Vec::new();
        for n in 0..700u32 {
            let mut key = [0u8; 32];
            key[..4].copy_from_slice(&n.to_be_bytes());
            let signer = PublicKey::from_bytes(key);
            importances.push((signer, 100));
            infos.push(create_info(signer, test_hash(n), 0, 10_000));
        }
        let context = TestContext::new(throttle_config(1_200, 120), &importances);

        let summary = context.updater.update_new(infos);

        assert_eq!(summary, BatchSummary::new(669, 31, 0));
        assert_eq!(context.cache.len(), 669);
    }

    fn throttle_second(info: &TransactionInfo, _: &ThrottleSnapshot<'_>) -> bool {
        info.entity_hash == test_hash(2)
    }

    #[test]
    fn test_custom_throttle() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let updater = context.updater.with_throttle(Box::new(throttle_second));

        let summary = updater.update_new((1..=3).map(simple_info).collect());
        assert_eq!(summary, BatchSummary::new(2, 1, 0));
        assert!(!context.cache.contains(&test_hash(2)));
    }

    // ==================== Apply After Commit ====================

    #[test]
    fn test_after_commit_evicts_confirmed_and_revalidates() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let residents: Vec<_> = (1..=3).map(simple_info).collect();
        context.updater.update_new(residents);

        let reverted = simple_info(4);
        let summary = context
            .updater
            .update_after_commit(&[test_hash(2)], vec![reverted.clone()]);

        assert_eq!(summary, BatchSummary::new(3, 0, 0));
        assert_eq!(context.cache.hashes(), vec![test_hash(4), test_hash(1), test_hash(3)]);
        assert_eq!(context.pipeline.lock().rebases, 1);

        let executed = context.executed();
        assert_eq!(&executed[3..], &[test_hash(4), test_hash(1), test_hash(3)]);
    }

    #[test]
    fn test_after_commit_absent_confirmed_hash_is_noop() {
        let context = TestContext::new(UtConfig::default(), &[]);
        context.updater.update_new(vec![simple_info(1)]);

        let summary = context.updater.update_after_commit(&[test_hash(99)], Vec::new());

        assert_eq!(summary, BatchSummary::new(1, 0, 0));
        assert_eq!(context.cache.hashes(), vec![test_hash(1)]);
    }

    #[test]
    fn test_after_commit_drops_residents_invalidated_by_block() {
        let context = TestContext::new(UtConfig::default(), &[]);
        context.updater.update_new((1..=3).map(simple_info).collect());
        context.set_result(test_hash(2), ValidationResult::Failure(ValidationCode(7)));

        let summary = context.updater.update_after_commit(&[], Vec::new());

        assert_eq!(summary, BatchSummary::new(2, 0, 1));
        assert_eq!(context.cache.hashes(), vec![test_hash(1), test_hash(3)]);
        assert_eq!(
            context.failures(),
            vec![(test_hash(2), RejectReason::ValidationFailed(ValidationCode(7)))]
        );
    }

    #[test]
    fn test_after_commit_reverted_bypasses_throttle() {
        let signer = test_signer(1);
        let context = TestContext::new(throttle_config(100, 10), &[]);
        for n in 0..10 {
            context.cache.add(create_info(test_signer(2), test_hash(n), 0, 10_000));
        }

        let new = create_info(signer, test_hash(100), 0, 10_000);
        assert_eq!(context.updater.update_new(vec![new]), BatchSummary::new(0, 1, 0));

        let reverted: Vec<_> = (200..215).map(|n| create_info(signer, test_hash(n), 0, 10_000)).collect();
        let summary = context.updater.update_after_commit(&[], reverted.clone());

        // residents come after the reverted transactions and are throttled again
        assert_eq!(summary, BatchSummary::new(15, 10, 0));
        assert_eq!(context.cache.hashes(), hashes(&reverted));
    }

    #[test]
    fn test_after_commit_reverted_confirmed_hash_is_readded() {
        let context = TestContext::new(UtConfig::default(), &[]);
        let info = simple_info(1);
        context.updater.update_new(vec![info.clone()]);

        let summary = context.updater.update_after_commit(&[info.entity_hash], vec![info.clone()]);

        assert_eq!(summary, BatchSummary::new(1, 0, 0));
        assert_eq!(context.cache.hashes(), vec![info.entity_hash]);
    }

    // ==================== Concurrency ====================

    #[test]
    fn test_sink_may_resubmit_to_updater() {
        let cache = Arc::new(MemoryUtCache::new());
        let pipeline = Arc::new(Mutex::new(PipelineRecord::default()));
        pipeline
            .lock()
            .results
            .insert(test_hash(1), ValidationResult::Failure(ValidationCode(1)));
        let slot: Arc<OnceLock<Weak<UtUpdater>>> = Arc::new(OnceLock::new());
        let sink_slot = Arc::clone(&slot);

        let updater = Arc::new(UtUpdater::new(
            &UtConfig::default(),
            Arc::clone(&cache) as Arc<dyn UtCache>,
            Arc::new(MockState {
                height: Mutex::new(Height::new(10)),
                importances: HashMap::new(),
            }),
            Box::new(MockPipeline(Arc::clone(&pipeline))),
            Box::new(move |info: TransactionInfo, _: RejectReason| {
                if info.entity_hash != test_hash(1) {
                    return;
                }
                if let Some(updater) = sink_slot.get().and_then(Weak::upgrade) {
                    updater.update_new(vec![simple_info(2)]);
                }
            }),
        ));
        slot.set(Arc::downgrade(&updater)).unwrap();

        let summary = updater.update_new(vec![simple_info(1)]);

        assert_eq!(summary, BatchSummary::new(0, 0, 1));
        assert_eq!(cache.hashes(), vec![test_hash(2)]);
    }

    #[test]
    fn test_concurrent_update_new_respects_capacity() {
        let mut config = throttle_config(100, 1);
        config.enable_spam_throttling = false;
        let context = TestContext::new(config, &[]);
        let updater = &context.updater;

        let admitted: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8u32)
                .map(|thread| {
                    scope.spawn(move || {
                        let infos = (0..40).map(|n| simple_info(thread * 1_000 + n)).collect();
                        updater.update_new(infos).admitted
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).sum()
        });

        assert_eq!(admitted, 100);
        assert_eq!(context.cache.len(), 100);
        assert_eq!(context.updater.metrics().snapshot().cache_size, 100);
    }

    // ==================== Prune & Metrics ====================

    #[test]
    fn test_prune_removes_expired() {
        let context = TestContext::new(UtConfig::default(), &[]);
        context.updater.update_new(vec![
            create_info(test_signer(1), test_hash(1), 0, 100),
            create_info(test_signer(1), test_hash(2), 0, 200),
            create_info(test_signer(2), test_hash(3), 0, 300),
        ]);

        let pruned = context.updater.prune(Timestamp::new(200));

        assert_eq!(hashes(&pruned), vec![test_hash(1)]);
        assert_eq!(context.cache.hashes(), vec![test_hash(2), test_hash(3)]);
        assert_eq!(context.updater.metrics().snapshot().pruned, 1);
    }

    #[test]
    fn test_metrics_recorded_per_batch() {
        let context = TestContext::new(UtConfig::default(), &[]);
        context.set_result(test_hash(2), ValidationResult::Failure(ValidationCode(1)));
        context.updater.update_new(vec![simple_info(1), simple_info(2)]);
        context.updater.update_new(vec![simple_info(1)]);

        let snapshot = context.updater.metrics().snapshot();
        assert_eq!(snapshot.batches, 2);
        assert_eq!(snapshot.admitted, 1);
        assert_eq!(snapshot.deferred, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.cache_size, 1);
    }
}
