use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use beacon_core::intents::Intents;
use beacon_db::presences::PresenceRow;
use beacon_models::gateway::GatewayFrame;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::outbound::Outbound;

/// Rolling inbound-frame window: more than this many frames without a
/// 60-second quiet gap closes the connection with 4008.
pub const RATE_LIMIT_FRAMES: u32 = 60;
pub const RATE_WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Authenticating,
    Ready,
    Active,
    Closing,
    Closed,
}

#[derive(Debug)]
pub struct RateWindow {
    count: u32,
    last_activity: Instant,
}

impl RateWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            last_activity: now,
        }
    }

    /// Count one inbound frame. Returns true when the session has exceeded
    /// the window limit. A quiet gap longer than the window resets the
    /// counter.
    pub fn record(&mut self, now: Instant) -> bool {
        self.count += 1;
        if now.duration_since(self.last_activity) > RATE_WINDOW {
            self.count = 0;
        }
        self.last_activity = now;
        self.count > RATE_LIMIT_FRAMES
    }
}

/// In-memory state for one authenticated live connection. The connection
/// task exclusively owns identity fields; the router reads `user_id` /
/// `intents`, queries and mutates the synchronized guild set, and enqueues
/// sends. The compression context lives with the writer task on the other
/// end of the outbound queue and is never shared.
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    pub intents: Intents,
    joined_guilds: RwLock<Vec<i64>>,
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    presence: Mutex<Option<PresenceRow>>,
    rate: Mutex<RateWindow>,
    state: Mutex<ConnState>,
    torn_down: AtomicBool,
}

impl Session {
    pub fn new(user_id: i64, intents: Intents, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            intents,
            joined_guilds: RwLock::new(Vec::new()),
            outbound: Mutex::new(Some(outbound)),
            presence: Mutex::new(None),
            rate: Mutex::new(RateWindow::new(Instant::now())),
            state: Mutex::new(ConnState::Ready),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: ConnState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn joined_guilds(&self) -> Vec<i64> {
        self.joined_guilds.read().unwrap().clone()
    }

    pub fn in_guild(&self, guild_id: i64) -> bool {
        self.joined_guilds.read().unwrap().contains(&guild_id)
    }

    /// True when this session shares at least one guild with `guilds`.
    pub fn shares_guild(&self, guilds: &[i64]) -> bool {
        let own = self.joined_guilds.read().unwrap();
        guilds.iter().any(|g| own.contains(g))
    }

    pub fn add_guild(&self, guild_id: i64) {
        let mut guilds = self.joined_guilds.write().unwrap();
        if !guilds.contains(&guild_id) {
            guilds.push(guild_id);
        }
    }

    /// Removing a guild the session never joined is a no-op.
    pub fn remove_guild(&self, guild_id: i64) {
        self.joined_guilds.write().unwrap().retain(|g| *g != guild_id);
    }

    pub fn cached_presence(&self) -> Option<PresenceRow> {
        self.presence.lock().unwrap().clone()
    }

    pub fn cache_presence(&self, row: PresenceRow) {
        *self.presence.lock().unwrap() = Some(row);
    }

    /// Count one inbound frame against the rolling window.
    pub fn record_frame(&self, now: Instant) -> bool {
        self.rate.lock().unwrap().record(now)
    }

    /// Enqueue a frame for the writer task. Never blocks: a full queue or a
    /// dead socket is a delivery failure reported to the caller.
    pub fn send(&self, frame: GatewayFrame) -> Result<(), GatewayError> {
        self.enqueue(Outbound::Frame(frame))
    }

    pub fn send_close(&self, code: u16, reason: &'static str) -> Result<(), GatewayError> {
        self.enqueue(Outbound::Close { code, reason })
    }

    fn enqueue(&self, item: Outbound) -> Result<(), GatewayError> {
        let Some(tx) = self.outbound.lock().unwrap().clone() else {
            return Err(GatewayError::DeliveryFailure("connection torn down"));
        };
        tx.try_send(item).map_err(|err| match err {
            TrySendError::Full(_) => GatewayError::DeliveryFailure("outbound queue full"),
            TrySendError::Closed(_) => GatewayError::DeliveryFailure("socket closed"),
        })
    }

    /// True once the writer task is gone (socket closed) or teardown has
    /// dropped the queue.
    pub fn outbound_closed(&self) -> bool {
        self.outbound
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.is_closed())
            .unwrap_or(true)
    }

    /// Drop the outbound queue, letting the writer drain and release the
    /// compression context.
    pub(crate) fn close_outbound(&self) {
        self.outbound.lock().unwrap().take();
    }

    /// Claim teardown. Only the first caller gets `true`; every later entry
    /// into the teardown path is a no-op.
    pub fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_session(intents: Intents) -> (Session, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        (Session::new(1, intents, tx), rx)
    }

    #[test]
    fn add_guild_deduplicates() {
        let (session, _rx) = test_session(Intents::empty());
        session.add_guild(7);
        session.add_guild(7);
        assert_eq!(session.joined_guilds(), vec![7]);
    }

    #[test]
    fn remove_unknown_guild_is_noop() {
        let (session, _rx) = test_session(Intents::empty());
        session.add_guild(7);
        session.remove_guild(99);
        assert_eq!(session.joined_guilds(), vec![7]);
        session.remove_guild(7);
        assert!(session.joined_guilds().is_empty());
    }

    #[test]
    fn shares_guild_checks_overlap() {
        let (session, _rx) = test_session(Intents::empty());
        session.add_guild(1);
        session.add_guild(2);
        assert!(session.shares_guild(&[2, 3]));
        assert!(!session.shares_guild(&[3, 4]));
        assert!(!session.shares_guild(&[]));
    }

    #[test]
    fn rate_window_triggers_on_61st_rapid_frame() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        for i in 1..=60 {
            assert!(!window.record(start + Duration::from_millis(i)), "frame {i}");
        }
        assert!(window.record(start + Duration::from_millis(61)));
    }

    #[test]
    fn rate_window_resets_after_quiet_gap() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        for i in 1..=30 {
            assert!(!window.record(start + Duration::from_millis(i)));
        }
        // More than a full window of silence, then a second burst.
        let resumed = start + Duration::from_secs(70);
        for i in 0..30 {
            assert!(!window.record(resumed + Duration::from_millis(i)));
        }
    }

    #[test]
    fn teardown_claim_is_exclusive() {
        let (session, _rx) = test_session(Intents::empty());
        assert!(session.begin_teardown());
        assert!(!session.begin_teardown());
        assert!(session.torn_down());
    }

    #[test]
    fn send_after_close_is_delivery_failure() {
        let (session, rx) = test_session(Intents::empty());
        drop(rx);
        let err = session
            .send(GatewayFrame::push(serde_json::json!({})))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DeliveryFailure(_)));
    }

    #[test]
    fn full_queue_is_delivery_failure_not_a_block() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(1, Intents::empty(), tx);
        session.send(GatewayFrame::push(serde_json::json!(1))).unwrap();
        let err = session
            .send(GatewayFrame::push(serde_json::json!(2)))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DeliveryFailure(_)));
    }
}
