// 🔗 Notification Pipeline
// monitored filter → duplicate suppression → admission → supervised extraction → sink
//
// Everything is constructed once and injected; no global registry.

use crate::admission::{AdmissionController, AdmissionDecision};
use crate::banks::BankDirectory;
use crate::config::AppConfig;
use crate::deduplication::{DuplicateDecision, DuplicateSuppressor};
use crate::dispatch::{Origin, TransactionEnvelope, TransactionSink};
use crate::extraction::{ExtractionEngine, ExtractionOutcome, NoMatchReason, RawEvent};
use crate::ocr::{OcrDocument, OcrFieldMapper};
use crate::recovery::RecoverySupervisor;
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Dispatched { envelope: TransactionEnvelope },
    /// Source is not in the monitored set
    Unmonitored,
    /// Notification with blank title and body
    Empty,
    Duplicate,
    RateLimited,
    NoMatch { reason: NoMatchReason },
    /// Extracted, but the sink refused it
    DispatchFailed { error: String },
}

impl PipelineOutcome {
    pub fn envelope(&self) -> Option<&TransactionEnvelope> {
        match self {
            PipelineOutcome::Dispatched { envelope } => Some(envelope),
            _ => None,
        }
    }

    pub fn is_dispatched(&self) -> bool {
        self.envelope().is_some()
    }
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    dispatched: AtomicU64,
    unmonitored: AtomicU64,
    empty: AtomicU64,
    duplicates: AtomicU64,
    rate_limited: AtomicU64,
    no_match: AtomicU64,
    dispatch_failed: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::Dispatched { .. } => &self.dispatched,
            PipelineOutcome::Unmonitored => &self.unmonitored,
            PipelineOutcome::Empty => &self.empty,
            PipelineOutcome::Duplicate => &self.duplicates,
            PipelineOutcome::RateLimited => &self.rate_limited,
            PipelineOutcome::NoMatch { .. } => &self.no_match,
            PipelineOutcome::DispatchFailed { .. } => &self.dispatch_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub received: u64,
    pub dispatched: u64,
    pub unmonitored: u64,
    pub empty: u64,
    pub duplicates: u64,
    pub rate_limited: u64,
    pub no_match: u64,
    pub dispatch_failed: u64,
    pub recovered_failures: u64,
}

impl PipelineStats {
    pub fn summary(&self) -> String {
        format!(
            "Received: {}, Dispatched: {}, Dropped: {} (dup {}, rate {}, no match {}), Recovered failures: {}",
            self.received,
            self.dispatched,
            self.received.saturating_sub(self.dispatched),
            self.duplicates,
            self.rate_limited,
            self.no_match,
            self.recovered_failures
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct NotificationPipeline {
    monitored: HashSet<String>,
    duplicates: DuplicateSuppressor,
    admission: AdmissionController,
    supervisor: RecoverySupervisor<ExtractionEngine>,
    ocr: OcrFieldMapper,
    sink: Box<dyn TransactionSink>,
    counters: Counters,
}

impl NotificationPipeline {
    pub fn new(
        engine: ExtractionEngine,
        admission: AdmissionController,
        duplicates: DuplicateSuppressor,
        ocr: OcrFieldMapper,
        sink: Box<dyn TransactionSink>,
    ) -> Self {
        NotificationPipeline {
            monitored: HashSet::new(),
            duplicates,
            admission,
            supervisor: RecoverySupervisor::new(engine),
            ocr,
            sink,
            counters: Counters::default(),
        }
    }

    /// Builder: only accept these sources (empty accepts all)
    pub fn with_monitored_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.monitored = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Wire every component from a validated config
    pub fn from_config(config: &AppConfig, sink: Box<dyn TransactionSink>) -> Result<Self> {
        config.validate()?;
        let rules = Arc::new(config.rule_table()?);

        let pipeline = NotificationPipeline::new(
            ExtractionEngine::new(Arc::clone(&rules)),
            AdmissionController::new(config.rate_limit.max_events, config.rate_limit.window_ms),
            DuplicateSuppressor::new(config.duplicate_window_ms),
            OcrFieldMapper::new(rules, BankDirectory::thai(), config.logo_regions.clone()),
            sink,
        )
        .with_monitored_sources(config.monitored_sources.iter().cloned());

        tracing::info!(
            rules = pipeline.engine().rules().len(),
            monitored = pipeline.monitored.len(),
            max_events = config.rate_limit.max_events,
            window_ms = config.rate_limit.window_ms,
            "notification pipeline ready"
        );
        Ok(pipeline)
    }

    pub fn engine(&self) -> &ExtractionEngine {
        self.supervisor.inner()
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn is_monitored(&self, source: &str) -> bool {
        self.monitored.is_empty() || self.monitored.contains(source)
    }

    /// Handle a notification using the wall clock
    pub fn handle_notification(&self, event: RawEvent) -> PipelineOutcome {
        self.handle_notification_at(event, Utc::now().timestamp_millis())
    }

    pub fn handle_notification_at(&self, event: RawEvent, now_ms: i64) -> PipelineOutcome {
        let outcome = self.process_notification(&event, now_ms);
        self.finish(&event, outcome)
    }

    /// Handle an OCR document using the wall clock
    pub fn handle_ocr(&self, doc: &OcrDocument) -> PipelineOutcome {
        self.handle_ocr_at(doc, Utc::now().timestamp_millis())
    }

    /// OCR text skips the monitored filter; the capture side already
    /// limited itself to banking apps.
    pub fn handle_ocr_at(&self, doc: &OcrDocument, now_ms: i64) -> PipelineOutcome {
        let mapping = self.ocr.map(doc);
        let outcome = match self.admit(&mapping.event, now_ms) {
            Some(dropped) => dropped,
            None => self.extract_and_dispatch(&mapping.event, Origin::Ocr, now_ms),
        };
        self.finish(&mapping.event, outcome)
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            received: c.received.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            unmonitored: c.unmonitored.load(Ordering::Relaxed),
            empty: c.empty.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            no_match: c.no_match.load(Ordering::Relaxed),
            dispatch_failed: c.dispatch_failed.load(Ordering::Relaxed),
            recovered_failures: self.supervisor.failures(),
        }
    }

    fn process_notification(&self, event: &RawEvent, now_ms: i64) -> PipelineOutcome {
        if !self.is_monitored(event.source.as_str()) {
            return PipelineOutcome::Unmonitored;
        }
        if event.is_blank() {
            return PipelineOutcome::Empty;
        }
        if let Some(dropped) = self.admit(event, now_ms) {
            return dropped;
        }
        self.extract_and_dispatch(event, Origin::Notification, now_ms)
    }

    // Duplicates are dropped before they can use up the rate budget
    fn admit(&self, event: &RawEvent, now_ms: i64) -> Option<PipelineOutcome> {
        if self.duplicates.check(event, now_ms) == DuplicateDecision::Duplicate {
            return Some(PipelineOutcome::Duplicate);
        }
        if self.admission.admit(now_ms) == AdmissionDecision::Deny {
            return Some(PipelineOutcome::RateLimited);
        }
        None
    }

    fn extract_and_dispatch(&self, event: &RawEvent, origin: Origin, now_ms: i64) -> PipelineOutcome {
        let tx = match self.supervisor.extract(event) {
            ExtractionOutcome::Extracted(tx) => tx,
            ExtractionOutcome::NoMatch { reason } => return PipelineOutcome::NoMatch { reason },
        };

        let envelope = TransactionEnvelope::new(origin, event.source.clone(), tx, now_ms);
        match self.sink.deliver(&envelope) {
            Ok(()) => PipelineOutcome::Dispatched { envelope },
            Err(err) => {
                tracing::error!(source = %event.source, "failed to dispatch transaction: {:#}", err);
                PipelineOutcome::DispatchFailed {
                    error: err.to_string(),
                }
            }
        }
    }

    fn finish(&self, event: &RawEvent, outcome: PipelineOutcome) -> PipelineOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        self.counters.record(&outcome);

        match &outcome {
            PipelineOutcome::Dispatched { envelope } => tracing::info!(
                source = %event.source,
                bank = %envelope.bank_name,
                amount = %envelope.amount,
                "transaction dispatched"
            ),
            PipelineOutcome::NoMatch { reason } => tracing::debug!(
                source = %event.source,
                reason = reason.as_str(),
                "not a bank transaction"
            ),
            other => tracing::debug!(source = %event.source, outcome = ?other, "event dropped"),
        }

        outcome
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ChannelSink;
    use crate::ocr::default_logo_regions;
    use crate::rules::{RuleSpec, RuleTable};
    use rust_decimal::Decimal;
    use std::sync::mpsc::Receiver;

    const NOW: i64 = 1_700_000_000_000;

    fn pipeline(max_events: u32) -> (NotificationPipeline, Receiver<TransactionEnvelope>) {
        let mut specs = vec![RuleSpec::thai_transfer("BANK_A", "BANK_A")];
        specs.extend(crate::rules::default_rule_specs());
        let rules = Arc::new(RuleTable::from_specs(&specs).unwrap());

        let (sink, rx) = ChannelSink::pair();
        let pipeline = NotificationPipeline::new(
            ExtractionEngine::new(Arc::clone(&rules)),
            AdmissionController::new(max_events, 60_000),
            DuplicateSuppressor::new(5_000),
            OcrFieldMapper::new(rules, BankDirectory::thai(), default_logo_regions()),
            Box::new(sink),
        );
        (pipeline, rx)
    }

    fn bank_a(body: &str) -> RawEvent {
        RawEvent::new("BANK_A", "", body, NOW)
    }

    #[test]
    fn test_end_to_end_dispatch() {
        let (pipeline, rx) = pipeline(10);

        let outcome = pipeline.handle_notification_at(
            bank_a("เงินเข้า 2,500.00 บาท จาก สมชาย บัญชี 123-4-56789"),
            NOW,
        );
        assert!(outcome.is_dispatched());

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.bank_name, "BANK_A");
        assert_eq!(envelope.amount, Decimal::new(250000, 2));
        assert_eq!(envelope.account_number, "123-4-56789");
        assert_eq!(envelope.sender_info, "สมชาย");
        assert_eq!(envelope.source.as_str(), "BANK_A");
        assert_eq!(envelope.origin, Origin::Notification);
    }

    #[test]
    fn test_duplicate_notification_dropped() {
        let (pipeline, rx) = pipeline(10);
        let event = bank_a("เงินเข้า 10.00 บาท");

        assert!(pipeline.handle_notification_at(event.clone(), NOW).is_dispatched());
        assert_eq!(pipeline.handle_notification_at(event, NOW + 1_000), PipelineOutcome::Duplicate);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_rate_limit_drops_events() {
        let (pipeline, _rx) = pipeline(2);

        for i in 0..2 {
            let outcome = pipeline.handle_notification_at(bank_a(&format!("เงินเข้า {}.00 บาท", i + 1)), NOW);
            assert!(outcome.is_dispatched());
        }
        let outcome = pipeline.handle_notification_at(bank_a("เงินเข้า 3.00 บาท"), NOW);
        assert_eq!(outcome, PipelineOutcome::RateLimited);

        let stats = pipeline.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.rate_limited, 1);
    }

    #[test]
    fn test_unmonitored_source_ignored() {
        let (pipeline, _rx) = pipeline(10);
        let pipeline = pipeline.with_monitored_sources(["com.scb.phone"]);

        let outcome = pipeline.handle_notification_at(bank_a("เงินเข้า 10.00 บาท"), NOW);
        assert_eq!(outcome, PipelineOutcome::Unmonitored);
        assert!(pipeline.admission().snapshot().is_none());
    }

    #[test]
    fn test_blank_notification_is_empty() {
        let (pipeline, _rx) = pipeline(10);
        let outcome = pipeline.handle_notification_at(bank_a("   "), NOW);
        assert_eq!(outcome, PipelineOutcome::Empty);
    }

    #[test]
    fn test_no_match_is_reported() {
        let (pipeline, rx) = pipeline(10);

        let outcome = pipeline.handle_notification_at(bank_a("โปรโมชั่นพิเศษวันนี้"), NOW);
        assert_eq!(
            outcome,
            PipelineOutcome::NoMatch {
                reason: NoMatchReason::AmountNotFound
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_failure_reported() {
        let (pipeline, rx) = pipeline(10);
        drop(rx);

        let outcome = pipeline.handle_notification_at(bank_a("เงินเข้า 10.00 บาท"), NOW);
        assert!(matches!(outcome, PipelineOutcome::DispatchFailed { .. }));
        assert_eq!(pipeline.stats().dispatch_failed, 1);
    }

    #[test]
    fn test_ocr_document_dispatched() {
        let (pipeline, rx) = pipeline(10);
        let doc = OcrDocument::from_text("ธนาคารกรุงไทย\nโอนเงินสำเร็จ 450.00 บาท", NOW);

        let outcome = pipeline.handle_ocr_at(&doc, NOW);
        assert!(outcome.is_dispatched());

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.bank_name, "KTB");
        assert_eq!(envelope.origin, Origin::Ocr);
        assert_eq!(envelope.source.as_str(), "com.ktb.netbank");
    }

    #[test]
    fn test_from_config() {
        let (sink, _rx) = ChannelSink::pair();
        let pipeline = NotificationPipeline::from_config(&AppConfig::default(), Box::new(sink)).unwrap();

        assert!(pipeline.is_monitored("com.scb.phone"));
        assert!(!pipeline.is_monitored("com.example.game"));
        assert_eq!(pipeline.admission().max_events(), 10);
    }

    #[test]
    fn test_summary_tolerates_torn_snapshot() {
        let stats = PipelineStats {
            received: 0,
            dispatched: 1,
            unmonitored: 0,
            empty: 0,
            duplicates: 0,
            rate_limited: 0,
            no_match: 0,
            dispatch_failed: 0,
            recovered_failures: 0,
        };
        assert!(stats.summary().contains("Dropped: 0"));
    }

    #[test]
    fn test_stats_summary() {
        let (pipeline, _rx) = pipeline(10);
        pipeline.handle_notification_at(bank_a("เงินเข้า 10.00 บาท"), NOW);
        pipeline.handle_notification_at(bank_a("hello"), NOW);

        let summary = pipeline.stats().summary();
        assert!(summary.contains("Received: 2"));
        assert!(summary.contains("Dispatched: 1"));
    }
}
