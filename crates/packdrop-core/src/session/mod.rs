//! ============================================================================
//! Scan Session - Marker events, packs and taps
//! ============================================================================
//! Turns AR marker events and screen taps into pack lifecycles:
//!
//!   Idle -> ScanDetected -> pack Spawned -> Opened -> Collected -> destroyed
//!
//! The session never sleeps. Callers feed it marker events and taps with
//! the current time and call `tick(now)` every frame. Scan requests run as
//! tokio tasks and report back through a channel tagged with the session
//! epoch; `reset` bumps the epoch so anything in flight is ignored.
//! ============================================================================

pub mod timers;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PackDropConfig;
use crate::error::ScanError;
use crate::service::ScanService;
use crate::types::{MarkerEvent, MarkerEventKind, Pose, ScanResult, TrackingState};

pub use timers::Timers;

pub type PackId = u64;

/// Spawn gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready to spawn once the cooldown has passed
    Idle,
    /// A pack was spawned and its bounded wait is running
    ScanDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackState {
    Spawned,
    Opened,
    Collected,
}

/// On-screen status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Marker seen but tracking is not good enough to spawn
    HoldSteady,
    Scanning,
    /// Result attached; any tap opens the pack
    TapToOpen,
    LoginRequired,
}

impl Prompt {
    pub fn message(&self) -> &'static str {
        match self {
            Self::HoldSteady => "Align Camera... hold steady",
            Self::Scanning => "Scanning...",
            Self::TapToOpen => "PACK FOUND!\nTap ANYWHERE to Open.",
            Self::LoginRequired => "Error: Login Required.",
        }
    }
}

/// What the presentation layer should react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PackSpawned { pack: PackId, marker: String, pose: Pose },
    PackMoved { pack: PackId, pose: Pose, visible: bool },
    ResultReady { pack: PackId, result: ScanResult },
    /// The bounded wait ran out before the result came back
    NetworkLag { pack: PackId },
    /// Pack opened: show the item and its notification card
    CollectibleSpawned { pack: PackId, result: ScanResult, message: String },
    CollectStarted { pack: PackId },
    PackDestroyed { pack: PackId },
    Prompt(Prompt),
    ConnectionError { pack: PackId, message: String },
}

/// A spawned pack tied to a marker
#[derive(Debug, Clone)]
pub struct Pack {
    pub id: PackId,
    pub marker: String,
    pub pose: Pose,
    pub visible: bool,
    pub state: PackState,
    pub result: Option<ScanResult>,
    /// Congrats text for the notification card
    pub message: Option<String>,
    /// Collectible grow-in is running; taps are ignored
    animating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKey {
    NetworkWait(PackId),
    SpawnAnimation(PackId),
    AutoCollect(PackId),
    FlyAway(PackId),
}

/// Scan outcome plus its congrats text
type ScanOutcome = Result<(ScanResult, Option<String>), ScanError>;

struct Completion {
    epoch: u64,
    pack: PackId,
    outcome: ScanOutcome,
}

pub struct ScanSession {
    service: Arc<ScanService>,
    config: PackDropConfig,
    state: SessionState,
    epoch: u64,
    /// Cooldown anchor: session start, last reset or last spawn
    last_spawn_at: Duration,
    next_pack: PackId,
    packs: BTreeMap<PackId, Pack>,
    timers: Timers<TimerKey>,
    in_flight: HashMap<PackId, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl ScanSession {
    /// Start a session at `now`; the first spawn waits out the cooldown
    pub fn new(service: Arc<ScanService>, config: PackDropConfig, now: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            config,
            state: SessionState::Idle,
            epoch: 0,
            last_spawn_at: now,
            next_pack: 1,
            packs: BTreeMap::new(),
            timers: Timers::new(),
            in_flight: HashMap::new(),
            tx,
            rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn packs(&self) -> impl Iterator<Item = &Pack> {
        self.packs.values()
    }

    pub fn pack(&self, id: PackId) -> Option<&Pack> {
        self.packs.get(&id)
    }

    /// Earliest pending timer, useful for sleeping until the next tick
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn on_marker(&mut self, event: &MarkerEvent, now: Duration) -> Vec<SessionEvent> {
        let existing = self
            .packs
            .values_mut()
            .find(|p| p.marker == event.marker);

        if let Some(pack) = existing {
            pack.pose = event.pose;
            pack.visible = event.kind != MarkerEventKind::Removed
                && event.tracking != TrackingState::None;
            return vec![SessionEvent::PackMoved {
                pack: pack.id,
                pose: pack.pose,
                visible: pack.visible,
            }];
        }

        if event.kind == MarkerEventKind::Removed || event.marker != self.config.marker_name {
            return Vec::new();
        }
        if self.state != SessionState::Idle {
            debug!("Spawn in progress, ignoring {}", event.marker);
            return Vec::new();
        }
        if now.saturating_sub(self.last_spawn_at) < self.config.cooldown() {
            return Vec::new();
        }

        match event.tracking {
            TrackingState::Tracking => self.spawn(event, now),
            TrackingState::Limited => vec![SessionEvent::Prompt(Prompt::HoldSteady)],
            TrackingState::None => Vec::new(),
        }
    }

    /// A tap anywhere on screen acts on the first visible pack
    pub fn tap(&mut self, now: Duration) -> Vec<SessionEvent> {
        let Some(id) = self.packs.values().find(|p| p.visible).map(|p| p.id) else {
            return Vec::new();
        };
        let Some(pack) = self.packs.get_mut(&id) else {
            return Vec::new();
        };

        match pack.state {
            PackState::Spawned => {
                let Some(result) = pack.result.clone() else {
                    debug!("Pack {} tapped before its result arrived", id);
                    return Vec::new();
                };
                pack.state = PackState::Opened;
                pack.animating = true;
                let message = pack.message.clone().unwrap_or_default();

                self.timers
                    .schedule(TimerKey::SpawnAnimation(id), now + self.config.spawn_animation());
                if let Some(delay) = self.config.auto_collect() {
                    self.timers.schedule(TimerKey::AutoCollect(id), now + delay);
                }
                info!("Opened pack {} ({})", id, result.item_id);
                vec![SessionEvent::CollectibleSpawned { pack: id, result, message }]
            }
            PackState::Opened if pack.animating => Vec::new(),
            PackState::Opened => self.collect(id, now),
            PackState::Collected => Vec::new(),
        }
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Apply finished scans and fire due timers
    pub fn tick(&mut self, now: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        while let Ok(completion) = self.rx.try_recv() {
            if completion.epoch != self.epoch {
                debug!("Dropping scan result for pack {} from epoch {}", completion.pack, completion.epoch);
                continue;
            }
            self.in_flight.remove(&completion.pack);
            events.extend(self.apply_completion(completion.pack, completion.outcome));
        }

        for key in self.timers.pop_due(now) {
            events.extend(self.fire(key, now));
        }

        events
    }

    /// Leave the scan screen: destroy every pack, abandon in-flight scans
    /// and restart the cooldown from `now`
    pub fn reset(&mut self, now: Duration) -> Vec<SessionEvent> {
        self.epoch += 1;
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
        self.timers.clear();
        self.state = SessionState::Idle;
        self.last_spawn_at = now;

        let events: Vec<SessionEvent> = self
            .packs
            .keys()
            .map(|id| SessionEvent::PackDestroyed { pack: *id })
            .collect();
        self.packs.clear();

        info!("Session reset (epoch {})", self.epoch);
        events
    }

    /// Wait for every in-flight scan to finish. Results are still applied by
    /// the next `tick`.
    pub async fn settle(&mut self) {
        let handles: Vec<JoinHandle<()>> = self.in_flight.drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Scan task failed: {}", e);
                }
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn spawn(&mut self, event: &MarkerEvent, now: Duration) -> Vec<SessionEvent> {
        let id = self.next_pack;
        self.next_pack += 1;
        self.state = SessionState::ScanDetected;
        self.last_spawn_at = now;

        self.packs.insert(
            id,
            Pack {
                id,
                marker: event.marker.clone(),
                pose: event.pose,
                visible: true,
                state: PackState::Spawned,
                result: None,
                message: None,
                animating: false,
            },
        );
        self.timers
            .schedule(TimerKey::NetworkWait(id), now + self.config.network_wait());

        let service = self.service.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let handle = tokio::spawn(async move {
            let outcome = scan(&service).await;
            // Receiver is gone only if the session was dropped
            let _ = tx.send(Completion { epoch, pack: id, outcome });
        });
        self.in_flight.insert(id, handle);

        info!("Spawned pack {} on {}", id, event.marker);
        vec![
            SessionEvent::PackSpawned {
                pack: id,
                marker: event.marker.clone(),
                pose: event.pose,
            },
            SessionEvent::Prompt(Prompt::Scanning),
        ]
    }

    fn apply_completion(&mut self, id: PackId, outcome: ScanOutcome) -> Vec<SessionEvent> {
        if !self.packs.contains_key(&id) {
            return Vec::new();
        }

        match outcome {
            Ok((result, message)) => {
                let Some(pack) = self.packs.get_mut(&id) else {
                    return Vec::new();
                };
                pack.result = Some(result.clone());
                pack.message = message;
                vec![
                    SessionEvent::ResultReady { pack: id, result },
                    SessionEvent::Prompt(Prompt::TapToOpen),
                ]
            }
            Err(ScanError::NotAuthenticated) => {
                warn!("Scan for pack {} needs a signed-in user", id);
                let mut events = vec![SessionEvent::Prompt(Prompt::LoginRequired)];
                events.extend(self.destroy(id));
                events
            }
            Err(e) => {
                warn!("Scan for pack {} failed: {:?}", id, e);
                let mut events = vec![SessionEvent::ConnectionError {
                    pack: id,
                    message: e.to_string(),
                }];
                events.extend(self.destroy(id));
                events
            }
        }
    }

    fn fire(&mut self, key: TimerKey, now: Duration) -> Vec<SessionEvent> {
        match key {
            TimerKey::NetworkWait(id) => {
                self.state = SessionState::Idle;
                match self.packs.get(&id) {
                    Some(pack) if pack.result.is_none() => {
                        warn!("Pack {} still waiting on its scan result", id);
                        vec![SessionEvent::NetworkLag { pack: id }]
                    }
                    _ => Vec::new(),
                }
            }
            TimerKey::SpawnAnimation(id) => {
                if let Some(pack) = self.packs.get_mut(&id) {
                    pack.animating = false;
                }
                Vec::new()
            }
            TimerKey::AutoCollect(id) => match self.packs.get(&id) {
                Some(pack) if pack.state == PackState::Opened => self.collect(id, now),
                _ => Vec::new(),
            },
            TimerKey::FlyAway(id) => self.destroy(id),
        }
    }

    fn collect(&mut self, id: PackId, now: Duration) -> Vec<SessionEvent> {
        let Some(pack) = self.packs.get_mut(&id) else {
            return Vec::new();
        };
        pack.state = PackState::Collected;
        pack.animating = false;
        self.timers.cancel(&TimerKey::AutoCollect(id));
        self.timers.cancel(&TimerKey::SpawnAnimation(id));
        self.timers.schedule(TimerKey::FlyAway(id), now + self.config.fly_away());
        debug!("Collecting pack {}", id);
        vec![SessionEvent::CollectStarted { pack: id }]
    }

    fn destroy(&mut self, id: PackId) -> Vec<SessionEvent> {
        // The bounded wait keeps running so the spawn gate still holds
        for key in [
            TimerKey::SpawnAnimation(id),
            TimerKey::AutoCollect(id),
            TimerKey::FlyAway(id),
        ] {
            self.timers.cancel(&key);
        }
        if let Some(handle) = self.in_flight.remove(&id) {
            handle.abort();
        }
        match self.packs.remove(&id) {
            Some(_) => vec![SessionEvent::PackDestroyed { pack: id }],
            None => Vec::new(),
        }
    }
}

async fn scan(service: &ScanService) -> ScanOutcome {
    let result = service.record_scan().await?;
    let message = service
        .item(&result.item_id)
        .await
        .map(|item| result.congrats_message(&item));
    Ok((result, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CollectionBackend, MemoryBackend};
    use crate::catalog::Catalog;
    use crate::drop_resolver::DropResolver;
    use crate::types::{ClaimPolicy, ItemStats, UserProfile, Voucher, VoucherEntry};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn secs(s: f64) -> Duration {
        Duration::from_millis((s * 1000.0).round() as u64)
    }

    fn logo() -> MarkerEvent {
        MarkerEvent::tracking("OCK_Logo", Pose::default())
    }

    async fn signed_in_service(backend: Arc<dyn CollectionBackend>) -> Arc<ScanService> {
        let service = ScanService::new(
            backend,
            Catalog::default_catalog(),
            DropResolver::seeded(11),
            ClaimPolicy::OnClaim,
        );
        service.sign_up("mei", "mei@example.com").await.unwrap();
        Arc::new(service)
    }

    async fn session(config: PackDropConfig) -> ScanSession {
        let service = signed_in_service(Arc::new(MemoryBackend::new())).await;
        ScanSession::new(service, config, Duration::ZERO)
    }

    fn spawned(events: &[SessionEvent]) -> bool {
        events.iter().any(|e| matches!(e, SessionEvent::PackSpawned { .. }))
    }

    /// Spawn at `at`, wait for the result and apply it
    async fn spawn_ready(session: &mut ScanSession, at: Duration) -> PackId {
        let events = session.on_marker(&logo(), at);
        assert!(spawned(&events));
        session.settle().await;
        let events = session.tick(at);
        match events.first() {
            Some(SessionEvent::ResultReady { pack, .. }) => *pack,
            other => panic!("expected a result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cooldown_gates_first_spawn() {
        let mut session = session(PackDropConfig::default()).await;
        for t in [0.0, 0.5, 1.9] {
            assert!(!spawned(&session.on_marker(&logo(), secs(t))));
        }
        assert!(spawned(&session.on_marker(&logo(), secs(2.1))));
        assert_eq!(session.packs().count(), 1);
        assert_eq!(session.state(), SessionState::ScanDetected);
    }

    #[tokio::test]
    async fn test_other_markers_and_limited_tracking_do_not_spawn() {
        let mut session = session(PackDropConfig::default()).await;
        let other = MarkerEvent::tracking("Menu_Board", Pose::default());
        assert!(session.on_marker(&other, secs(3.0)).is_empty());

        let mut limited = logo();
        limited.tracking = TrackingState::Limited;
        assert_eq!(
            session.on_marker(&limited, secs(3.0)),
            vec![SessionEvent::Prompt(Prompt::HoldSteady)]
        );
        assert_eq!(session.packs().count(), 0);
    }

    #[tokio::test]
    async fn test_open_then_collect_spawns_one_collectible() {
        let mut session = session(PackDropConfig::default()).await;
        let id = spawn_ready(&mut session, secs(2.0)).await;

        let opened = session.tap(secs(2.2));
        assert!(matches!(
            opened.as_slice(),
            [SessionEvent::CollectibleSpawned { message, .. }] if message.starts_with("You got ")
        ));
        // grow-in still running
        assert!(session.tap(secs(2.4)).is_empty());
        assert_eq!(session.pack(id).unwrap().state, PackState::Opened);

        session.tick(secs(2.7));
        assert_eq!(session.tap(secs(2.8)), vec![SessionEvent::CollectStarted { pack: id }]);
        assert!(session.tap(secs(2.9)).is_empty());

        assert_eq!(session.tick(secs(3.3)), vec![SessionEvent::PackDestroyed { pack: id }]);
        assert_eq!(session.packs().count(), 0);
    }

    #[tokio::test]
    async fn test_tap_before_result_is_ignored() {
        let mut session = session(PackDropConfig::default()).await;
        assert!(spawned(&session.on_marker(&logo(), secs(2.0))));
        assert!(session.tap(secs(2.1)).is_empty());
        assert_eq!(session.packs().next().unwrap().state, PackState::Spawned);
    }

    #[tokio::test]
    async fn test_existing_pack_follows_marker() {
        let mut session = session(PackDropConfig::default()).await;
        let id = spawn_ready(&mut session, secs(2.0)).await;

        let mut lost = MarkerEvent::tracking("OCK_Logo", Pose { position: [0.0, 1.0, 0.0], rotation: [0.0; 4] });
        lost.tracking = TrackingState::None;
        let events = session.on_marker(&lost, secs(2.5));
        assert!(matches!(events.as_slice(), [SessionEvent::PackMoved { visible: false, .. }]));
        assert_eq!(session.pack(id).unwrap().pose.position, [0.0, 1.0, 0.0]);

        // hidden packs do not take taps
        assert!(session.tap(secs(2.6)).is_empty());

        session.on_marker(&logo(), secs(2.7));
        assert!(session.pack(id).unwrap().visible);
        assert!(!session.tap(secs(2.8)).is_empty());
    }

    #[tokio::test]
    async fn test_bounded_wait_blocks_second_spawn() {
        let mut session = session(PackDropConfig::default()).await;
        let id = spawn_ready(&mut session, secs(2.0)).await;
        session.tap(secs(2.1));
        session.tick(secs(2.7));
        session.tap(secs(2.8));
        session.tick(secs(3.4));
        assert!(session.pack(id).is_none());

        // network wait from the 2.0 spawn is still running
        assert_eq!(session.next_deadline(), Some(secs(4.0)));
        assert!(!spawned(&session.on_marker(&logo(), secs(3.5))));
        session.tick(secs(4.0));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(spawned(&session.on_marker(&logo(), secs(4.1))));
    }

    #[tokio::test]
    async fn test_reset_destroys_packs_and_drops_late_results() {
        let mut session = session(PackDropConfig::default()).await;
        assert!(spawned(&session.on_marker(&logo(), secs(2.0))));
        let events = session.reset(secs(2.1));
        assert_eq!(events.len(), 1);
        assert_eq!(session.packs().count(), 0);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.epoch(), 1);

        session.settle().await;
        assert!(session.tick(secs(5.0)).is_empty());

        // cooldown restarts at the reset
        assert!(!spawned(&session.on_marker(&logo(), secs(3.0))));
        assert!(spawned(&session.on_marker(&logo(), secs(4.2))));
    }

    #[tokio::test]
    async fn test_stale_epoch_completion_is_dropped() {
        let mut session = session(PackDropConfig::default()).await;
        let result = {
            let id = spawn_ready(&mut session, secs(2.0)).await;
            session.pack(id).unwrap().result.clone().unwrap()
        };
        session.reset(secs(3.0));
        let stale = Completion { epoch: 0, pack: 1, outcome: Ok((result, None)) };
        assert!(session.tx.send(stale).is_ok());
        assert!(session.tick(secs(3.1)).is_empty());
    }

    #[tokio::test]
    async fn test_auto_collect() {
        let config = PackDropConfig {
            auto_collect_ms: Some(3000),
            ..PackDropConfig::default()
        };
        let mut session = session(config).await;
        let id = spawn_ready(&mut session, secs(2.0)).await;
        session.tap(secs(2.0));

        let events = session.tick(secs(5.0));
        assert!(events.contains(&SessionEvent::CollectStarted { pack: id }));
        assert!(session.tick(secs(5.5)).contains(&SessionEvent::PackDestroyed { pack: id }));
    }

    #[tokio::test]
    async fn test_signed_out_discards_pack() {
        let backend = Arc::new(MemoryBackend::new());
        let service = signed_in_service(backend).await;
        service.sign_out().await;
        let mut session = ScanSession::new(service, PackDropConfig::default(), Duration::ZERO);

        assert!(spawned(&session.on_marker(&logo(), secs(2.0))));
        session.settle().await;
        let events = session.tick(secs(2.1));
        assert_eq!(events[0], SessionEvent::Prompt(Prompt::LoginRequired));
        assert!(matches!(events[1], SessionEvent::PackDestroyed { .. }));
        assert_eq!(session.packs().count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_reports_connection_error() {
        let backend = Arc::new(MemoryBackend::new());
        let service = signed_in_service(backend.clone()).await;
        backend.set_offline(true);
        let mut session = ScanSession::new(service, PackDropConfig::default(), Duration::ZERO);

        session.on_marker(&logo(), secs(2.0));
        session.settle().await;
        let events = session.tick(secs(2.1));
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::ConnectionError { message, .. }, SessionEvent::PackDestroyed { .. }]
                if message == "Connection error"
        ));
    }

    /// Backend whose scan visit blocks until released
    struct SlowBackend {
        inner: MemoryBackend,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl CollectionBackend for SlowBackend {
        async fn create_user(&self, profile: &UserProfile, item_ids: &[String]) -> anyhow::Result<()> {
            self.inner.create_user(profile, item_ids).await
        }
        async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
            self.inner.get_user(user_id).await
        }
        async fn record_scan_visit(&self, user_id: &str) -> anyhow::Result<u64> {
            self.release.notified().await;
            self.inner.record_scan_visit(user_id).await
        }
        async fn increment_item_count(&self, user_id: &str, item_id: &str) -> anyhow::Result<u32> {
            self.inner.increment_item_count(user_id, item_id).await
        }
        async fn is_reward_claimed(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool> {
            self.inner.is_reward_claimed(user_id, item_id).await
        }
        async fn mark_unlock_notified(&self, user_id: &str, item_id: &str) -> anyhow::Result<bool> {
            self.inner.mark_unlock_notified(user_id, item_id).await
        }
        async fn claim_reward(&self, user_id: &str, voucher: &Voucher) -> anyhow::Result<Option<String>> {
            self.inner.claim_reward(user_id, voucher).await
        }
        async fn vouchers(&self, user_id: &str) -> anyhow::Result<Vec<VoucherEntry>> {
            self.inner.vouchers(user_id).await
        }
        async fn claim_flags(&self, user_id: &str) -> anyhow::Result<BTreeMap<String, bool>> {
            self.inner.claim_flags(user_id).await
        }
        async fn collection(&self, user_id: &str) -> anyhow::Result<BTreeMap<String, u32>> {
            self.inner.collection(user_id).await
        }
        async fn item_stats(&self) -> anyhow::Result<Vec<(String, ItemStats)>> {
            self.inner.item_stats().await
        }
    }

    #[tokio::test]
    async fn test_network_lag_then_late_result() {
        let release = Arc::new(Notify::new());
        let backend = Arc::new(SlowBackend {
            inner: MemoryBackend::new(),
            release: release.clone(),
        });
        let service = signed_in_service(backend).await;
        let mut session = ScanSession::new(service, PackDropConfig::default(), Duration::ZERO);

        assert!(spawned(&session.on_marker(&logo(), secs(2.0))));
        tokio::task::yield_now().await;
        assert!(session.tick(secs(3.0)).is_empty());

        let id = session.packs().next().unwrap().id;
        assert_eq!(session.tick(secs(4.0)), vec![SessionEvent::NetworkLag { pack: id }]);
        assert_eq!(session.state(), SessionState::Idle);

        // notify_one stores a permit if the task has not polled yet
        release.notify_one();
        session.settle().await;
        let events = session.tick(secs(4.5));
        assert!(matches!(events.first(), Some(SessionEvent::ResultReady { pack, .. }) if *pack == id));
    }
}
