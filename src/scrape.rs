//! Time-windowed message collection and JSON emission

use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use grammers_client::types::peer::Peer;
use grammers_client::Client;
use tracing::{debug, info};

use crate::chat::ChatReference;
use crate::error::{Error, Result};
use crate::record::{MessageRecord, MessageView};

/// Decision for one history item during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// In the window (and topic, when one is set): project and collect.
    Keep,
    /// Not a usable message here, but newer items may still follow.
    Skip,
    /// Older than the cutoff: end the whole scan.
    Stop,
}

/// Start of the trailing window: `now` minus the requested day count.
/// Day counts that no duration or datetime can represent are rejected
/// instead of panicking inside chrono.
pub fn cutoff(days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let span = Duration::try_days(days)
        .ok_or_else(|| Error::InvalidArgument(format!("day count {} is out of range", days)))?;
    now.checked_sub_signed(span)
        .ok_or_else(|| Error::InvalidArgument(format!("day count {} is out of range", days)))
}

/// Classify one history item against the cutoff and the optional topic.
///
/// Items without a timestamp are skipped. The first item dated before the
/// cutoff stops the scan outright. A topic mismatch only skips: topic
/// membership says nothing about the timestamps that follow.
pub fn scan_message<M: MessageView>(
    msg: &M,
    cutoff: DateTime<Utc>,
    topic_id: Option<i32>,
) -> Scan {
    let Some(date) = msg.timestamp() else {
        return Scan::Skip;
    };

    if date < cutoff {
        return Scan::Stop;
    }

    if let Some(topic) = topic_id {
        // A topic's starter message is its own root.
        let in_topic = msg.msg_id() == topic || msg.topic_root() == Some(topic);
        if !in_topic {
            return Scan::Skip;
        }
    }

    Scan::Keep
}

/// Collect every message in the trailing window, newest first.
///
/// Precondition (from the client's iteration contract): `iter_messages`
/// yields history monotonically ordered by date, newest to oldest. The scan
/// therefore ends at the first message older than the cutoff instead of
/// examining the rest of the history.
pub async fn fetch_window(
    client: &Client,
    peer: &Peer,
    reference: &ChatReference,
    cutoff: DateTime<Utc>,
) -> Result<Vec<MessageRecord>> {
    let mut records = Vec::new();
    let mut iter = client.iter_messages(peer);

    while let Some(msg) = iter.next().await? {
        match scan_message(&msg, cutoff, reference.topic_id) {
            Scan::Stop => break,
            Scan::Skip => continue,
            Scan::Keep => {
                if let Some(record) = MessageRecord::project(&reference.identifier, &msg) {
                    records.push(record);
                }
            }
        }
    }

    debug!(
        chat = %reference.identifier,
        topic = ?reference.topic_id,
        count = records.len(),
        "window scan finished"
    );

    Ok(records)
}

/// Serialize the collected records as a single JSON array to the sink.
/// serde_json keeps non-ASCII characters literal; no escaping happens here.
pub fn emit_json<W: Write>(records: &[MessageRecord], sink: &mut W, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *sink, records)?;
    } else {
        serde_json::to_writer(&mut *sink, records)?;
    }
    sink.write_all(b"\n")?;
    sink.flush()?;

    info!(count = records.len(), "emitted records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testing::StubMessage;
    use chrono::TimeZone;

    fn date(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    /// Walk a synthetic descending history the same way fetch_window does,
    /// counting how many items the "collaborator" had to produce.
    fn drive(
        items: Vec<StubMessage>,
        cutoff_at: DateTime<Utc>,
        topic_id: Option<i32>,
    ) -> (Vec<MessageRecord>, usize) {
        let mut records = Vec::new();
        let mut pulled = 0usize;

        for msg in items {
            pulled += 1;
            match scan_message(&msg, cutoff_at, topic_id) {
                Scan::Stop => break,
                Scan::Skip => continue,
                Scan::Keep => {
                    if let Some(record) = MessageRecord::project("somechat", &msg) {
                        records.push(record);
                    }
                }
            }
        }

        (records, pulled)
    }

    #[test]
    fn cutoff_is_days_before_now() {
        let now = date(1_700_000_000);
        assert_eq!(cutoff(30, now).unwrap(), now - Duration::days(30));
        assert_eq!(cutoff(0, now).unwrap(), now);
    }

    #[test]
    fn cutoff_rejects_unrepresentable_day_counts() {
        let now = date(1_700_000_000);
        // Too large for a chrono Duration at all.
        assert!(matches!(
            cutoff(i64::MAX, now),
            Err(Error::InvalidArgument(_))
        ));
        // Representable as a Duration, but the resulting datetime would
        // fall outside chrono's range.
        assert!(matches!(
            cutoff(1_000_000_000, now),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn window_is_exactly_the_fresh_prefix() {
        let base = 1_700_000_000;
        let items = vec![
            StubMessage::at(5, date(base + 500)),
            StubMessage::at(4, date(base + 400)),
            StubMessage::at(3, date(base + 300)),
            StubMessage::at(2, date(base - 100)),
            StubMessage::at(1, date(base - 200)),
        ];

        let (records, pulled) = drive(items, date(base), None);

        let ids: Vec<i32> = records.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
        // The scan stops at the first out-of-window item; nothing past it
        // is pulled from the collaborator.
        assert_eq!(pulled, 4);
    }

    #[test]
    fn boundary_message_at_cutoff_is_kept() {
        let base = 1_700_000_000;
        let items = vec![StubMessage::at(1, date(base))];
        let (records, _) = drive(items, date(base), None);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn empty_history_yields_empty_window() {
        let (records, pulled) = drive(Vec::new(), date(1_700_000_000), None);
        assert!(records.is_empty());
        assert_eq!(pulled, 0);
    }

    #[test]
    fn all_messages_out_of_window_stops_on_first() {
        let base = 1_700_000_000;
        let items = vec![
            StubMessage::at(2, date(base - 10)),
            StubMessage::at(1, date(base - 20)),
        ];
        let (records, pulled) = drive(items, date(base), None);
        assert!(records.is_empty());
        assert_eq!(pulled, 1);
    }

    #[test]
    fn dateless_items_are_skipped_not_fatal() {
        let base = 1_700_000_000;
        let mut dateless = StubMessage::at(9, date(base + 50));
        dateless.date = None;
        let items = vec![
            StubMessage::at(3, date(base + 100)),
            dateless,
            StubMessage::at(1, date(base + 10)),
        ];

        let (records, _) = drive(items, date(base), None);
        let ids: Vec<i32> = records.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn topic_filter_skips_other_threads() {
        let base = 1_700_000_000;
        let mut in_topic = StubMessage::at(4, date(base + 400));
        in_topic.topic_root = Some(7);
        let mut other_topic = StubMessage::at(3, date(base + 300));
        other_topic.topic_root = Some(8);
        let mut starter = StubMessage::at(7, date(base + 100));
        starter.topic_root = None;
        let items = vec![
            in_topic,
            other_topic,
            StubMessage::at(2, date(base + 200)),
            starter,
        ];

        let (records, pulled) = drive(items, date(base), Some(7));
        let ids: Vec<i32> = records.iter().map(|r| r.message_id).collect();
        // Thread members plus the topic starter itself; off-topic items are
        // skipped without ending the scan.
        assert_eq!(ids, vec![4, 7]);
        assert_eq!(pulled, 4);
    }

    #[test]
    fn topic_mismatch_does_not_stop_before_cutoff() {
        let base = 1_700_000_000;
        let mut off_topic = StubMessage::at(5, date(base + 500));
        off_topic.topic_root = Some(99);
        let mut on_topic_old = StubMessage::at(4, date(base - 10));
        on_topic_old.topic_root = Some(7);
        let items = vec![off_topic, on_topic_old];

        let (records, pulled) = drive(items, date(base), Some(7));
        assert!(records.is_empty());
        // The off-topic item is skipped; the scan still stops at the first
        // item older than the cutoff.
        assert_eq!(pulled, 2);
    }

    #[test]
    fn emit_compact_json_array() {
        let base = 1_700_000_000;
        let items = vec![StubMessage::at(1, date(base + 10))];
        let (records, _) = drive(items, date(base), None);

        let mut out = Vec::new();
        emit_json(&records, &mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with('['));
        // One array, terminated by a single newline.
        assert!(text.ends_with("]\n"));
        let parsed: Vec<MessageRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn emit_empty_window_is_empty_array() {
        let mut out = Vec::new();
        emit_json(&[], &mut out, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), "[]");
    }

    #[test]
    fn emit_pretty_json_is_still_one_array() {
        let base = 1_700_000_000;
        let items = vec![
            StubMessage::at(2, date(base + 20)),
            StubMessage::at(1, date(base + 10)),
        ];
        let (records, _) = drive(items, date(base), None);

        let mut out = Vec::new();
        emit_json(&records, &mut out, true).unwrap();
        let parsed: Vec<MessageRecord> =
            serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn emitted_json_preserves_non_ascii() {
        let base = 1_700_000_000;
        let mut msg = StubMessage::at(1, date(base + 10));
        msg.text = "день ☀".to_string();
        let (records, _) = drive(vec![msg], date(base), None);

        let mut out = Vec::new();
        emit_json(&records, &mut out, false).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("день ☀"));
    }
}
