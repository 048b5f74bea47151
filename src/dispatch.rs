// 📤 Dispatch - Hand extracted transactions to the host application
// Sinks are injected into the pipeline; there is no global listener.

use crate::extraction::ExtractedTransaction;
use crate::rules::SourceId;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::mpsc;
use std::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// ENVELOPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Notification,
    Ocr,
}

/// What crosses the boundary to the host UI. Field names follow the
/// host's method-channel payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub id: Uuid,
    pub origin: Origin,
    #[serde(rename = "packageName")]
    pub source: SourceId,
    pub bank_name: String,
    pub amount: Decimal,
    pub account_number: String,
    pub sender_info: String,
    pub raw_text: String,
    /// When the notification was posted (or the screen captured)
    #[serde(rename = "timestamp")]
    pub observed_at_ms: i64,
    pub dispatched_at_ms: i64,
}

impl TransactionEnvelope {
    pub fn new(origin: Origin, source: SourceId, tx: ExtractedTransaction, dispatched_at_ms: i64) -> Self {
        TransactionEnvelope {
            id: Uuid::new_v4(),
            origin,
            source,
            bank_name: tx.bank_name,
            amount: tx.amount,
            account_number: tx.account_number,
            sender_info: tx.sender_info,
            raw_text: tx.raw_text,
            observed_at_ms: tx.observed_at_ms,
            dispatched_at_ms,
        }
    }

    pub fn transaction(&self) -> ExtractedTransaction {
        ExtractedTransaction {
            bank_name: self.bank_name.clone(),
            amount: self.amount,
            account_number: self.account_number.clone(),
            sender_info: self.sender_info.clone(),
            raw_text: self.raw_text.clone(),
            observed_at_ms: self.observed_at_ms,
        }
    }

    pub fn alert(&self) -> TransactionAlert {
        TransactionAlert::render(&self.transaction())
    }
}

// ============================================================================
// ALERT RENDERING
// ============================================================================

/// User-facing notification text for an incoming transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAlert {
    pub title: String,
    pub body: String,
    /// Expanded text: amount, sender and account on separate lines
    pub detail: String,
}

impl TransactionAlert {
    pub fn render(tx: &ExtractedTransaction) -> Self {
        let amount = format_baht(tx.amount);
        let account = if tx.account_number.is_empty() {
            "-"
        } else {
            tx.account_number.as_str()
        };

        TransactionAlert {
            title: format!("รับเงินเข้าบัญชี {}", tx.bank_name),
            body: format!("{} บาท จาก {}", amount, tx.sender_info),
            detail: format!("จำนวน {} บาท\nจาก {}\nบัญชี {}", amount, tx.sender_info, account),
        }
    }
}

/// Two decimals with thousands separators: 2500 → "2,500.00"
pub fn format_baht(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    format!("{}.{}", grouped, frac_part)
}

// ============================================================================
// SINKS
// ============================================================================

/// Receives every successfully extracted transaction
pub trait TransactionSink: Send + Sync {
    fn deliver(&self, envelope: &TransactionEnvelope) -> Result<()>;
}

/// Forwards envelopes over a std channel (e.g. to a UI thread)
pub struct ChannelSink {
    sender: Mutex<mpsc::Sender<TransactionEnvelope>>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<TransactionEnvelope>) -> Self {
        ChannelSink {
            sender: Mutex::new(sender),
        }
    }

    /// Sink plus the receiving end
    pub fn pair() -> (Self, mpsc::Receiver<TransactionEnvelope>) {
        let (tx, rx) = mpsc::channel();
        (ChannelSink::new(tx), rx)
    }
}

impl TransactionSink for ChannelSink {
    fn deliver(&self, envelope: &TransactionEnvelope) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sender
            .send(envelope.clone())
            .context("transaction receiver has been dropped")
    }
}

/// Logs each transaction's alert text
pub struct LogSink;

impl TransactionSink for LogSink {
    fn deliver(&self, envelope: &TransactionEnvelope) -> Result<()> {
        let alert = envelope.alert();
        tracing::info!(
            id = %envelope.id,
            source = %envelope.source,
            bank = %envelope.bank_name,
            amount = %envelope.amount,
            "{} | {}",
            alert.title,
            alert.body
        );
        Ok(())
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> TransactionSink for JsonLinesSink<W> {
    fn deliver(&self, envelope: &TransactionEnvelope) -> Result<()> {
        let line = serde_json::to_string(envelope).context("failed to serialize transaction")?;
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line).context("failed to write transaction")?;
        writer.flush().context("failed to flush transaction output")?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> ExtractedTransaction {
        ExtractedTransaction {
            bank_name: "SCB".to_string(),
            amount: Decimal::new(250000, 2),
            account_number: "123-4-56789".to_string(),
            sender_info: "สมชาย".to_string(),
            raw_text: " เงินเข้า 2,500.00 บาท".to_string(),
            observed_at_ms: 1_000,
        }
    }

    fn sample_envelope() -> TransactionEnvelope {
        TransactionEnvelope::new(Origin::Notification, SourceId::from("com.scb.phone"), sample_tx(), 2_000)
    }

    #[test]
    fn test_alert_rendering() {
        let alert = TransactionAlert::render(&sample_tx());

        assert_eq!(alert.title, "รับเงินเข้าบัญชี SCB");
        assert_eq!(alert.body, "2,500.00 บาท จาก สมชาย");
        assert_eq!(alert.detail, "จำนวน 2,500.00 บาท\nจาก สมชาย\nบัญชี 123-4-56789");
    }

    #[test]
    fn test_alert_without_account() {
        let mut tx = sample_tx();
        tx.account_number.clear();
        assert!(TransactionAlert::render(&tx).detail.ends_with("บัญชี -"));
    }

    #[test]
    fn test_format_baht() {
        assert_eq!(format_baht(Decimal::new(5, 0)), "5.00");
        assert_eq!(format_baht(Decimal::new(123450, 2)), "1,234.50");
        assert_eq!(format_baht(Decimal::new(1234567891, 3)), "1,234,567.89");
        assert_eq!(format_baht(Decimal::new(999, 0)), "999.00");
    }

    #[test]
    fn test_envelope_field_names() {
        let json = serde_json::to_value(sample_envelope()).unwrap();

        assert_eq!(json["packageName"], "com.scb.phone");
        assert_eq!(json["bankName"], "SCB");
        assert_eq!(json["accountNumber"], "123-4-56789");
        assert_eq!(json["senderInfo"], "สมชาย");
        assert_eq!(json["timestamp"], 1_000);
        assert_eq!(json["origin"], "notification");
        assert!(json.get("rawText").is_some());
    }

    #[test]
    fn test_envelope_keeps_transaction() {
        let envelope = sample_envelope();
        assert_eq!(envelope.transaction(), sample_tx());
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, rx) = ChannelSink::pair();
        let envelope = sample_envelope();

        sink.deliver(&envelope).unwrap();
        assert_eq!(rx.recv().unwrap(), envelope);
    }

    #[test]
    fn test_channel_sink_fails_when_receiver_dropped() {
        let (sink, rx) = ChannelSink::pair();
        drop(rx);
        assert!(sink.deliver(&sample_envelope()).is_err());
    }

    #[test]
    fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.deliver(&sample_envelope()).unwrap();
        sink.deliver(&sample_envelope()).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: TransactionEnvelope = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.bank_name, "SCB");
    }
}
