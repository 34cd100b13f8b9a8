//! Latest-wins delivery slot for one connection.
//!
//! Most transports forbid concurrent writers, and a slow peer must never
//! stall the task that produced a state update. Each connection therefore
//! owns one [`CoalescingSlot`]: producers drop their payload into a pending
//! cell (overwriting whatever older payload is still there) and only the
//! single task that wins the writer lock actually touches the transport.
//! Superseded snapshots are skipped, never queued.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify};

use crate::domain::{ConnectionSink, TransportError};

/// What is queued for a connection between transport writes.
#[derive(Debug, Default)]
struct Pending {
    payload: Option<String>,
    ping: bool,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.payload.is_none() && !self.ping
    }
}

/// One frame taken from the pending cell.
enum Outbound {
    Text(String),
    Ping,
}

/// Per-connection delivery slot with latest-wins semantics.
pub struct CoalescingSlot {
    /// Freshest undelivered payload plus the keepalive flag. Held only for
    /// field swaps, never across a transport write.
    pending: Mutex<Pending>,
    /// The transport writer. `try_lock` on this mutex is the "sending" flag:
    /// whoever holds it drains the slot, everyone else returns immediately.
    writer: Mutex<Box<dyn ConnectionSink>>,
    failed: AtomicBool,
    closed: Notify,
}

impl CoalescingSlot {
    pub fn new(sink: Box<dyn ConnectionSink>) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            writer: Mutex::new(sink),
            failed: AtomicBool::new(false),
            closed: Notify::new(),
        }
    }

    /// Queue `payload` and/or a ping for this connection, then drain the
    /// slot unless another task is already doing so.
    ///
    /// A non-`None` payload overwrites an undelivered older one. The call
    /// only awaits transport I/O while it exclusively holds the writer, so
    /// producers racing against a busy connection return without blocking.
    ///
    /// Returns `Err` only from the call that performed the failing write;
    /// the slot is marked failed either way and [`closed`](Self::closed)
    /// resolves so the owning read loop can tear the connection down.
    pub async fn deliver(
        &self,
        payload: Option<String>,
        ping: bool,
    ) -> Result<(), TransportError> {
        if self.is_failed() {
            // Connection is already being torn down; drop the frame.
            return Ok(());
        }

        {
            let mut pending = self.pending.lock().await;
            if let Some(payload) = payload {
                pending.payload = Some(payload);
            }
            if ping {
                pending.ping = true;
            }
        }

        loop {
            let Ok(mut writer) = self.writer.try_lock() else {
                // Another task holds the writer; its drain loop will observe
                // the pending state stored above.
                return Ok(());
            };

            loop {
                let next = {
                    let mut pending = self.pending.lock().await;
                    if let Some(payload) = pending.payload.take() {
                        Some(Outbound::Text(payload))
                    } else if pending.ping {
                        pending.ping = false;
                        Some(Outbound::Ping)
                    } else {
                        None
                    }
                };

                let result = match next {
                    Some(Outbound::Text(payload)) => writer.send_text(payload).await,
                    Some(Outbound::Ping) => writer.send_ping().await,
                    None => break,
                };

                if let Err(e) = result {
                    self.fail();
                    return Err(e);
                }
            }

            drop(writer);

            // A producer may have stored a payload between the emptiness
            // check and the writer release; it saw the writer busy and
            // returned, so pick its frame up here.
            if self.pending.lock().await.is_empty() {
                return Ok(());
            }
        }
    }

    /// Whether a transport write on this slot has failed.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Resolves once a transport write on this slot has failed.
    pub async fn closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        loop {
            // Register before checking the flag so a notification between
            // the check and the await is not lost.
            notified.as_mut().enable();
            if self.is_failed() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.closed.notified());
        }
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::Release);
        self.closed.notify_waiters();
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::testing::{GatedSink, RecordingSink, SentFrame};
    use super::*;
    use crate::domain::MockConnectionSink;

    #[tokio::test]
    async fn test_sequential_delivery_writes_every_frame() {
        // テスト項目: ライターが空いていれば各 deliver が即座に書き込まれる
        // given (前提条件):
        let (sink, frames) = RecordingSink::new();
        let slot = CoalescingSlot::new(Box::new(sink));

        // when (操作):
        slot.deliver(Some("a".to_string()), false).await.unwrap();
        slot.deliver(Some("b".to_string()), false).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            *frames.lock().unwrap(),
            vec![
                SentFrame::Text("a".to_string()),
                SentFrame::Text("b".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_latest_payload_wins_under_contention() {
        // テスト項目: ライターが塞がっている間の中間ペイロードはスキップされ、
        //             最新のペイロードだけが書き込まれる
        // given (前提条件): 書き込みがゲートで止まるコネクション
        let (sink, frames, gate) = GatedSink::new();
        let slot = Arc::new(CoalescingSlot::new(Box::new(sink)));

        // when (操作): v0 の書き込み中に v1..v9 を連続して deliver する
        let drainer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.deliver(Some("v0".to_string()), false).await })
        };
        tokio::task::yield_now().await;
        for i in 1..10 {
            slot.deliver(Some(format!("v{i}")), false).await.unwrap();
        }
        gate.add_permits(16);
        drainer.await.unwrap().unwrap();

        // then (期待する結果): 書き込まれたのは進行中だった v0 と最新の v9 のみ
        assert_eq!(
            *frames.lock().unwrap(),
            vec![
                SentFrame::Text("v0".to_string()),
                SentFrame::Text("v9".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_pings_coalesce_into_one_frame() {
        // テスト項目: 複数の ping 要求は 1 つの ping フレームにまとめられる
        // given (前提条件):
        let (sink, frames, gate) = GatedSink::new();
        let slot = Arc::new(CoalescingSlot::new(Box::new(sink)));

        // when (操作):
        let drainer = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.deliver(Some("state".to_string()), false).await })
        };
        tokio::task::yield_now().await;
        for _ in 0..3 {
            slot.deliver(None, true).await.unwrap();
        }
        gate.add_permits(16);
        drainer.await.unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(
            *frames.lock().unwrap(),
            vec![SentFrame::Text("state".to_string()), SentFrame::Ping]
        );
    }

    #[tokio::test]
    async fn test_write_failure_marks_slot_closed() {
        // テスト項目: 書き込み失敗でスロットが failed になり closed() が解決する
        // given (前提条件): 常に書き込みに失敗するコネクション
        let mut sink = MockConnectionSink::new();
        sink.expect_send_text()
            .returning(|_| Err(TransportError("boom".to_string())));
        let slot = CoalescingSlot::new(Box::new(sink));

        // when (操作):
        let result = slot.deliver(Some("state".to_string()), false).await;

        // then (期待する結果):
        assert_eq!(result, Err(TransportError("boom".to_string())));
        assert!(slot.is_failed());
        tokio::time::timeout(Duration::from_secs(1), slot.closed())
            .await
            .expect("closed() should resolve after a write failure");

        // 失敗後の deliver は黙って破棄される
        assert_eq!(slot.deliver(Some("late".to_string()), false).await, Ok(()));
    }
}
