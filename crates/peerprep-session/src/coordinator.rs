//! Session coordination.
//!
//! One [`PeerSession`] owns one room attempt end to end: media acquisition,
//! transport construction, the offer/answer exchange through the signaling
//! store, candidate relay, connection-state tracking, and teardown. A
//! single driver task per session consumes the transport's event channel
//! and the store subscriptions; nothing else mutates negotiation state, so
//! no two live transports for the same room can coexist within a session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use peerprep_core::{Role, RoomId};
use peerprep_signal::{
    CandidateFeed, IceCandidate, RoomDoc, RoomWatch, SessionDescription, SignalStore,
};

use crate::config::{RtcConfig, SessionConfig};
use crate::error::{Result, SessionError};
use crate::media::{MediaSource, MediaStream, TrackKind};
use crate::state::{self, ConnectionState, SessionState};
use crate::transport::{PeerTransport, TransportError, TransportEvent, TransportFactory};

struct SessionInner {
    config: SessionConfig,
    store: Arc<dyn SignalStore>,
    transport: Arc<dyn PeerTransport>,
    local_stream: Mutex<Option<MediaStream>>,
    remote_stream: Mutex<Option<MediaStream>>,
    state_tx: watch::Sender<SessionState>,
    connection_tx: watch::Sender<ConnectionState>,
    closed: AtomicBool,
}

impl SessionInner {
    fn transition(&self, to: SessionState) {
        let from = *self.state_tx.borrow();
        if state::is_valid_transition(from, to) {
            self.state_tx.send_replace(to);
        }
    }
}

/// One owned two-party session attempt.
///
/// Constructed once per room attempt via [`PeerSession::start`]; the UI
/// layer holds immutable handles (stream clones, state watches) and calls
/// [`PeerSession::hang_up`] exactly as often as it likes.
pub struct PeerSession {
    inner: Arc<SessionInner>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl PeerSession {
    /// Establish a session for the configured room and role.
    ///
    /// Acquires camera+microphone, builds the transport with the configured
    /// reflection servers, attaches the local tracks, and runs the
    /// role-specific half of the offer/answer exchange. Returns once the
    /// exchange is in flight; connectivity progress is observed through
    /// [`PeerSession::watch_state`].
    ///
    /// # Errors
    ///
    /// - `SessionError::PermissionDenied` if the user denied capture access
    /// - `SessionError::MediaUnavailable` if no device could be opened
    /// - `SessionError::RoomNotFound` if a callee joins a room that does
    ///   not exist (no room is created in that case)
    /// - `SessionError::Signal` / `SessionError::Transport` if the exchange
    ///   itself fails
    pub async fn start(
        store: Arc<dyn SignalStore>,
        media: &dyn MediaSource,
        factory: &dyn TransportFactory,
        rtc: RtcConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        state_tx.send_replace(SessionState::AcquiringMedia);

        let local_stream = media.capture().await?;

        let transport = factory.create(&rtc)?;
        state_tx.send_replace(SessionState::Negotiating);
        tracing::debug!(room_id = %config.room_id, role = %config.role, "negotiating");

        let negotiated = match negotiate(&*store, &*transport, &local_stream, &config).await {
            Ok(negotiated) => negotiated,
            Err(err) => {
                // A failed start must not keep the camera or the transport.
                transport.close().await;
                local_stream.stop_all();
                return Err(err);
            }
        };
        let Negotiated {
            events,
            answer_watch,
            candidates,
            remote_description_set,
        } = negotiated;

        let (connection_tx, _) = watch::channel(ConnectionState::New);
        let inner = Arc::new(SessionInner {
            config,
            store,
            transport,
            local_stream: Mutex::new(Some(local_stream)),
            remote_stream: Mutex::new(None),
            state_tx,
            connection_tx,
            closed: AtomicBool::new(false),
        });

        let driver = tokio::spawn(drive(
            Arc::clone(&inner),
            events,
            answer_watch,
            candidates,
            remote_description_set,
        ));

        Ok(Self {
            inner,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// The room this session negotiates through.
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.inner.config.room_id
    }

    /// This party's fixed role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.config.role
    }

    /// The current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// The transport-derived connectivity state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection_tx.borrow()
    }

    /// The boolean the UI renders next to the remote video.
    #[must_use]
    pub fn is_peer_connected(&self) -> bool {
        self.connection_state().is_peer_connected()
    }

    /// A handle to the local capture stream, if the session is live.
    #[must_use]
    pub fn local_stream(&self) -> Option<MediaStream> {
        self.inner.local_stream.lock().clone()
    }

    /// A handle to the remote party's stream, once media has arrived.
    #[must_use]
    pub fn remote_stream(&self) -> Option<MediaStream> {
        self.inner.remote_stream.lock().clone()
    }

    /// Flip or explicitly set the enabled flag of one local track.
    ///
    /// Purely a local mute / camera-off toggle; no renegotiation, no
    /// signaling side effect. Returns the new flag, or `None` if the
    /// session holds no such track (e.g. after hang-up).
    pub fn toggle_track(&self, kind: TrackKind, enabled: Option<bool>) -> Option<bool> {
        let stream = self.inner.local_stream.lock();
        let track = stream.as_ref()?.track(kind)?;
        let new_value = match enabled {
            Some(explicit) => {
                track.set_enabled(explicit);
                explicit
            }
            None => track.toggle(),
        };
        Some(new_value)
    }

    /// Tear the session down.
    ///
    /// Idempotent and safe to invoke from user action, component teardown,
    /// or an outer timer. Handlers are detached before the transport is
    /// closed so stale state-change events cannot fire into a torn-down
    /// session; local and remote tracks are stopped; the room document and
    /// both candidate logs are then deleted best-effort. A cleanup failure
    /// is logged and swallowed - the user has already left the session.
    pub async fn hang_up(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.abort();
        }

        self.inner.transport.close().await;

        let local = self.inner.local_stream.lock().take();
        if let Some(stream) = local {
            stream.stop_all();
        }
        let remote = self.inner.remote_stream.lock().take();
        if let Some(stream) = remote {
            stream.stop_all();
        }

        self.inner.connection_tx.send_replace(ConnectionState::Closed);
        self.inner.transition(SessionState::Closed);

        if let Err(err) = self.inner.store.delete_room(&self.inner.config.room_id).await {
            tracing::warn!(
                room_id = %self.inner.config.room_id,
                error = %err,
                "signaling cleanup failed after hang-up"
            );
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        // Component teardown without an explicit hang-up still releases
        // local resources; the async store cleanup is skipped.
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        if let Some(stream) = self.inner.local_stream.lock().take() {
            stream.stop_all();
        }
        if let Some(stream) = self.inner.remote_stream.lock().take() {
            stream.stop_all();
        }
        self.inner.transition(SessionState::Closed);
    }
}

/// Everything the driver task needs from a completed exchange setup.
struct Negotiated {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    answer_watch: Option<RoomWatch>,
    candidates: Option<CandidateFeed>,
    remote_description_set: bool,
}

/// Attach the local tracks and run the role-specific half of the exchange.
async fn negotiate(
    store: &dyn SignalStore,
    transport: &dyn PeerTransport,
    local_stream: &MediaStream,
    config: &SessionConfig,
) -> Result<Negotiated> {
    for track in local_stream.tracks() {
        transport.add_local_track(Arc::clone(track)).await?;
    }
    let events = transport.take_events().ok_or(TransportError::Closed)?;

    let (answer_watch, candidates, remote_description_set) = match config.role {
        Role::Caller => start_call(store, transport, config).await?,
        Role::Callee => join_call(store, transport, config).await?,
    };

    Ok(Negotiated {
        events,
        answer_watch,
        candidates,
        remote_description_set,
    })
}

/// Caller half of the exchange: publish the offer, then wait for the answer
/// and the callee's candidates through the driver.
async fn start_call(
    store: &dyn SignalStore,
    transport: &dyn PeerTransport,
    config: &SessionConfig,
) -> Result<(Option<RoomWatch>, Option<CandidateFeed>, bool)> {
    let offer = transport.create_offer().await?;
    transport.set_local_description(offer.clone()).await?;

    let mut users = vec![config.user_id.clone()];
    if let Some(peer) = &config.peer_id {
        users.push(peer.clone());
    }
    store
        .create_room(&config.room_id, RoomDoc::with_offer(offer, users))
        .await?;

    let answer_watch = store.watch_room(&config.room_id).await?;
    let candidates = store
        .watch_candidates(&config.room_id, config.role.remote())
        .await?;

    Ok((Some(answer_watch), Some(candidates), false))
}

/// Callee half of the exchange: consume the existing offer, publish the
/// answer, then feed the caller's candidates through the driver.
async fn join_call(
    store: &dyn SignalStore,
    transport: &dyn PeerTransport,
    config: &SessionConfig,
) -> Result<(Option<RoomWatch>, Option<CandidateFeed>, bool)> {
    let doc = store
        .get_room(&config.room_id)
        .await?
        .ok_or(SessionError::RoomNotFound(config.room_id))?;
    let offer = doc
        .offer
        .ok_or(SessionError::RoomNotFound(config.room_id))?;

    transport.set_remote_description(offer).await?;
    let answer = transport.create_answer().await?;
    transport.set_local_description(answer.clone()).await?;
    store.set_answer(&config.room_id, answer).await?;

    let candidates = store
        .watch_candidates(&config.room_id, config.role.remote())
        .await?;

    Ok((None, Some(candidates), true))
}

/// Wait for the next room snapshot, or pend forever once unsubscribed.
async fn next_snapshot(watch: &mut Option<RoomWatch>) -> Option<Option<RoomDoc>> {
    match watch {
        Some(active) => active.changed().await,
        None => std::future::pending().await,
    }
}

/// Wait for the next remote candidate, or pend forever once the feed ends.
async fn next_candidate(feed: &mut Option<CandidateFeed>) -> Option<IceCandidate> {
    match feed {
        Some(active) => active.next().await,
        None => std::future::pending().await,
    }
}

/// The per-session driver: the single consumer of transport events and
/// store subscriptions.
async fn drive(
    inner: Arc<SessionInner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut answer_watch: Option<RoomWatch>,
    mut candidates: Option<CandidateFeed>,
    mut remote_description_set: bool,
) {
    let room_id = inner.config.room_id;
    let own_role = inner.config.role;
    // Remote candidates that arrive before the remote description; flushed
    // once it is set instead of leaning on transport-internal tolerance.
    let mut early_candidates: Vec<IceCandidate> = Vec::new();

    // The answer may already be in the document by the time the watch
    // registered (the callee raced the subscription round trip), in which
    // case no change is ever delivered for it.
    if !remote_description_set {
        let existing = answer_watch
            .as_ref()
            .and_then(|watch| watch.snapshot())
            .and_then(|doc| doc.answer);
        if let Some(answer) = existing {
            if apply_remote_description(&inner, answer).await {
                remote_description_set = true;
                answer_watch = None;
            }
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_transport_event(&inner, room_id, own_role, event).await;
            }

            snapshot = next_snapshot(&mut answer_watch) => {
                match snapshot {
                    Some(Some(doc)) => {
                        if remote_description_set {
                            continue;
                        }
                        let Some(answer) = doc.answer else { continue };
                        if apply_remote_description(&inner, answer).await {
                            remote_description_set = true;
                            flush_candidates(&inner, &mut early_candidates).await;
                            // The answer is consumed exactly once; stop
                            // observing the document.
                            answer_watch = None;
                        }
                    }
                    // Room deleted by the peer; connectivity events will
                    // surface the drop.
                    Some(None) => {}
                    None => answer_watch = None,
                }
            }

            candidate = next_candidate(&mut candidates) => {
                match candidate {
                    Some(candidate) if remote_description_set => {
                        feed_candidate(&inner, candidate).await;
                    }
                    Some(candidate) => early_candidates.push(candidate),
                    None => candidates = None,
                }
            }
        }
    }
}

async fn handle_transport_event(
    inner: &SessionInner,
    room_id: RoomId,
    own_role: Role,
    event: TransportEvent,
) {
    match event {
        TransportEvent::LocalCandidate(candidate) => {
            if let Err(err) = inner.store.add_candidate(&room_id, own_role, candidate).await {
                tracing::warn!(%room_id, error = %err, "failed to publish local candidate");
            }
        }
        TransportEvent::RemoteStream(stream) => {
            *inner.remote_stream.lock() = Some(stream);
        }
        TransportEvent::ConnectionStateChanged(connection) => {
            inner.connection_tx.send_replace(connection);
            let current = *inner.state_tx.borrow();
            if let Some(next) = state::apply_connectivity(current, connection) {
                inner.state_tx.send_replace(next);
            }
        }
    }
}

/// Apply the remote description once; duplicate deliveries are dropped by
/// the caller's `remote_description_set` guard.
async fn apply_remote_description(inner: &SessionInner, desc: SessionDescription) -> bool {
    match inner.transport.set_remote_description(desc).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                room_id = %inner.config.room_id,
                error = %err,
                "failed to apply remote description"
            );
            false
        }
    }
}

async fn flush_candidates(inner: &SessionInner, early: &mut Vec<IceCandidate>) {
    for candidate in early.drain(..) {
        feed_candidate(inner, candidate).await;
    }
}

async fn feed_candidate(inner: &SessionInner, candidate: IceCandidate) {
    if let Err(err) = inner.transport.add_remote_candidate(candidate).await {
        tracing::warn!(
            room_id = %inner.config.room_id,
            error = %err,
            "failed to apply remote candidate"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMediaSource, MockTransportFactory};
    use async_trait::async_trait;
    use peerprep_core::{QueueEntryId, UserId};
    use peerprep_signal::{ClaimedEntry, MemoryStore, QueueEntryWatch, Result as SignalResult};
    use std::time::Duration;

    /// Delegates to a `MemoryStore`, but writes the answer just before the
    /// room subscription registers. This reproduces the window in which the
    /// callee answers between the caller's room write and its watch round
    /// trips, so no change notification ever carries the answer.
    struct AnswerBeforeWatchStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl SignalStore for AnswerBeforeWatchStore {
        async fn create_room(&self, room_id: &RoomId, doc: RoomDoc) -> SignalResult<()> {
            self.inner.create_room(room_id, doc).await
        }

        async fn get_room(&self, room_id: &RoomId) -> SignalResult<Option<RoomDoc>> {
            self.inner.get_room(room_id).await
        }

        async fn set_answer(
            &self,
            room_id: &RoomId,
            answer: SessionDescription,
        ) -> SignalResult<()> {
            self.inner.set_answer(room_id, answer).await
        }

        async fn delete_room(&self, room_id: &RoomId) -> SignalResult<()> {
            self.inner.delete_room(room_id).await
        }

        async fn watch_room(&self, room_id: &RoomId) -> SignalResult<RoomWatch> {
            self.inner
                .set_answer(room_id, SessionDescription::answer("v=0 raced answer"))
                .await?;
            self.inner.watch_room(room_id).await
        }

        async fn add_candidate(
            &self,
            room_id: &RoomId,
            from: Role,
            candidate: IceCandidate,
        ) -> SignalResult<()> {
            self.inner.add_candidate(room_id, from, candidate).await
        }

        async fn watch_candidates(
            &self,
            room_id: &RoomId,
            from: Role,
        ) -> SignalResult<CandidateFeed> {
            self.inner.watch_candidates(room_id, from).await
        }

        async fn enqueue(&self, user_id: &UserId) -> SignalResult<QueueEntryId> {
            self.inner.enqueue(user_id).await
        }

        async fn claim_waiting(
            &self,
            room_id: &RoomId,
            claimer: &UserId,
        ) -> SignalResult<Option<ClaimedEntry>> {
            self.inner.claim_waiting(room_id, claimer).await
        }

        async fn remove_if_waiting(&self, entry_id: &QueueEntryId) -> SignalResult<bool> {
            self.inner.remove_if_waiting(entry_id).await
        }

        async fn watch_queue_entry(
            &self,
            entry_id: &QueueEntryId,
        ) -> SignalResult<QueueEntryWatch> {
            self.inner.watch_queue_entry(entry_id).await
        }
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn caller_config() -> SessionConfig {
        SessionConfig::new(RoomId::generate(), UserId::generate(), None)
    }

    async fn start_caller(
        store: &Arc<MemoryStore>,
        factory: &MockTransportFactory,
    ) -> PeerSession {
        PeerSession::start(
            Arc::clone(store) as Arc<dyn SignalStore>,
            &MockMediaSource::granting(),
            factory,
            RtcConfig::default(),
            caller_config(),
        )
        .await
        .expect("caller start")
    }

    #[tokio::test(start_paused = true)]
    async fn caller_stores_offer_before_any_candidate() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();

        let session = start_caller(&store, &factory).await;
        let room_id = session.room_id();

        // The offer is in the store as soon as start returns...
        let doc = store.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(doc.offer.unwrap().sdp, "v=0 mock offer");
        assert!(doc.answer.is_none());

        // ...and only then do discovered candidates get published.
        factory.only().emit_local_candidate(IceCandidate::new("candidate:1"));
        let mut feed = store.watch_candidates(&room_id, Role::Caller).await.unwrap();
        let published = tokio::time::timeout(Duration::from_secs(1), feed.next())
            .await
            .expect("candidate published")
            .unwrap();
        assert_eq!(published.candidate, "candidate:1");
    }

    #[tokio::test(start_paused = true)]
    async fn caller_records_both_users_when_peer_is_known() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let me = UserId::generate();
        let peer = UserId::generate();
        let config = SessionConfig::new(RoomId::generate(), me.clone(), Some(peer.clone()))
            .with_role(Role::Caller);

        let session = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::granting(),
            &factory,
            RtcConfig::default(),
            config,
        )
        .await
        .unwrap();

        let doc = store.get_room(&session.room_id()).await.unwrap().unwrap();
        assert_eq!(doc.users, Some(vec![me, peer]));
    }

    #[tokio::test(start_paused = true)]
    async fn callee_fails_on_missing_room_without_creating_one() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let room_id = RoomId::generate();
        let config =
            SessionConfig::new(room_id, UserId::generate(), Some(UserId::generate()));

        let result = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::granting(),
            &factory,
            RtcConfig::default(),
            config,
        )
        .await;

        assert!(matches!(result, Err(SessionError::RoomNotFound(id)) if id == room_id));
        assert!(store.get_room(&room_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn callee_consumes_offer_and_publishes_answer() {
        let store = Arc::new(MemoryStore::new());
        let caller_factory = MockTransportFactory::new();
        let caller = start_caller(&store, &caller_factory).await;
        let room_id = caller.room_id();

        let callee_factory = MockTransportFactory::new();
        let config = SessionConfig::new(room_id, UserId::generate(), Some(UserId::generate()));
        let _callee = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::granting(),
            &callee_factory,
            RtcConfig::default(),
            config,
        )
        .await
        .unwrap();

        let callee_transport = callee_factory.only();
        assert_eq!(
            callee_transport.remote_description().unwrap().sdp,
            "v=0 mock offer"
        );

        let doc = store.get_room(&room_id).await.unwrap().unwrap();
        assert_eq!(doc.answer.unwrap().sdp, "v=0 mock answer");
    }

    #[tokio::test(start_paused = true)]
    async fn answer_is_applied_at_most_once() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        let room_id = session.room_id();
        let transport = factory.only();

        store
            .set_answer(&room_id, SessionDescription::answer("v=0 answer"))
            .await
            .unwrap();
        eventually(|| transport.remote_description_sets() == 1).await;

        // The subscription firing again with the same value must not
        // re-apply the description.
        store
            .set_answer(&room_id, SessionDescription::answer("v=0 answer"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.remote_description_sets(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_present_at_subscription_time_is_applied() {
        let store = Arc::new(AnswerBeforeWatchStore {
            inner: MemoryStore::new(),
        });
        let factory = MockTransportFactory::new();

        let _session = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::granting(),
            &factory,
            RtcConfig::default(),
            caller_config(),
        )
        .await
        .unwrap();

        // No change notification will ever fire; the driver must pick the
        // answer out of the initial snapshot.
        let transport = factory.only();
        eventually(|| transport.remote_description_sets() == 1).await;
        assert_eq!(
            transport.remote_description().unwrap().sdp,
            "v=0 raced answer"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn early_candidates_are_buffered_until_answer_applies() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        let room_id = session.room_id();
        let transport = factory.only();

        // Callee candidates land before any answer exists.
        store
            .add_candidate(&room_id, Role::Callee, IceCandidate::new("candidate:1"))
            .await
            .unwrap();
        store
            .add_candidate(&room_id, Role::Callee, IceCandidate::new("candidate:2"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.remote_candidates().is_empty());

        store
            .set_answer(&room_id, SessionDescription::answer("v=0 answer"))
            .await
            .unwrap();
        eventually(|| transport.remote_candidates().len() == 2).await;

        let flushed: Vec<_> = transport
            .remote_candidates()
            .into_iter()
            .map(|c| c.candidate)
            .collect();
        assert_eq!(flushed, vec!["candidate:1", "candidate:2"]);

        // Late candidates now flow straight through.
        store
            .add_candidate(&room_id, Role::Callee, IceCandidate::new("candidate:3"))
            .await
            .unwrap();
        eventually(|| transport.remote_candidates().len() == 3).await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_join_releases_media_and_transport() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let media = MockMediaSource::granting();
        let config =
            SessionConfig::new(RoomId::generate(), UserId::generate(), Some(UserId::generate()));

        let result = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &media,
            &factory,
            RtcConfig::default(),
            config,
        )
        .await;
        assert!(matches!(result, Err(SessionError::RoomNotFound(_))));

        // The camera and the transport are released, not leaked until drop.
        assert!(factory.only().is_closed());
        let streams = media.captured_streams();
        assert_eq!(streams.len(), 1);
        assert!(streams[0].tracks().iter().all(|t| t.is_stopped()));
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_reports_drive_session_state() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        let transport = factory.only();
        assert_eq!(session.state(), SessionState::Negotiating);
        assert!(!session.is_peer_connected());

        transport.emit_connection_state(ConnectionState::Connected);
        let mut states = session.watch_state();
        eventually(|| session.is_peer_connected()).await;
        assert_eq!(*states.borrow_and_update(), SessionState::Connected);

        transport.emit_connection_state(ConnectionState::Failed);
        eventually(|| !session.is_peer_connected()).await;
        assert_eq!(session.state(), SessionState::Disconnected);

        // The transport may recover on its own; no reconnection is driven
        // from here.
        transport.emit_connection_state(ConnectionState::Connected);
        eventually(|| session.is_peer_connected()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn remote_stream_surfaces_on_track_arrival() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        assert!(session.remote_stream().is_none());

        let remote = MediaStream::new(vec![Arc::new(crate::media::MediaTrack::new(
            TrackKind::Video,
            "remote-video",
        ))]);
        factory.only().emit_remote_stream(remote);

        eventually(|| session.remote_stream().is_some()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_audio_leaves_video_untouched() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;

        assert_eq!(session.toggle_track(TrackKind::Audio, Some(false)), Some(false));

        let stream = session.local_stream().unwrap();
        assert!(!stream.track(TrackKind::Audio).unwrap().is_enabled());
        assert!(stream.track(TrackKind::Video).unwrap().is_enabled());

        // Flip without an explicit value.
        assert_eq!(session.toggle_track(TrackKind::Audio, None), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn hang_up_is_idempotent_and_clears_streams() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        let transport = factory.only();
        let local = session.local_stream().unwrap();

        session.hang_up().await;
        assert!(session.local_stream().is_none());
        assert!(session.remote_stream().is_none());
        assert!(local.tracks().iter().all(|t| t.is_stopped()));
        assert!(transport.is_closed());
        assert_eq!(session.state(), SessionState::Closed);

        // Second invocation must not throw and changes nothing.
        session.hang_up().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.toggle_track(TrackKind::Audio, None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hang_up_purges_the_room_tree() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();
        let session = start_caller(&store, &factory).await;
        let room_id = session.room_id();

        // Let the driver publish one candidate before teardown.
        factory.only().emit_local_candidate(IceCandidate::new("candidate:1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.hang_up().await;

        // A fresh get shows no document; the candidate logs were cleared in
        // the same batch.
        assert!(store.get_room(&room_id).await.unwrap().is_none());
        let mut feed = store.watch_candidates(&room_id, Role::Caller).await.unwrap();
        let replay = tokio::time::timeout(Duration::from_millis(50), feed.next()).await;
        assert!(replay.is_err() || replay.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denial_is_terminal_and_distinct() {
        let store = Arc::new(MemoryStore::new());
        let factory = MockTransportFactory::new();

        let denied = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::denying(),
            &factory,
            RtcConfig::default(),
            caller_config(),
        )
        .await;
        assert!(matches!(denied, Err(SessionError::PermissionDenied)));

        let unavailable = PeerSession::start(
            Arc::clone(&store) as Arc<dyn SignalStore>,
            &MockMediaSource::unavailable("no camera"),
            &factory,
            RtcConfig::default(),
            caller_config(),
        )
        .await;
        assert!(matches!(unavailable, Err(SessionError::MediaUnavailable(_))));

        // No transport was ever created for the denied attempts.
        assert!(factory.created().is_empty());
    }
}
