//! 방 이벤트 스트림 연결 핸들러
//!
//! 연결 하나당 `RoomStream` 하나. 생성 시 구독 → 게스트 등록 → 초기 상태 전송 →
//! 하트비트 시작 순서로 진행하고, `Drop`에서만 정리한다.

use crate::bus::ListenerId;
use crate::error::VotingError;
use crate::handlers::room::current_status;
use crate::identity::Identity;
use crate::protocol::{RoomEvent, RoomUrlName, VoterId};
use crate::state::AppState;
use axum::response::sse::Event;
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// 스트리밍 중인 연결
pub struct RoomStream {
    state: Arc<AppState>,
    room: RoomUrlName,
    listener_id: ListenerId,
    /// 게스트 연결이면 투표자 ID, 소유자 연결이면 `None`
    guest: Option<VoterId>,
    heartbeat: JoinHandle<()>,
}

impl RoomStream {
    /// 연결 시작. 이벤트를 받을 수신 채널을 함께 반환한다.
    pub fn open(
        state: Arc<AppState>,
        room: RoomUrlName,
        identity: &Identity,
    ) -> Result<(Self, UnboundedReceiver<RoomEvent>), VotingError> {
        if state.directory.room_name(&room).is_none() {
            return Err(VotingError::RoomNotFound);
        }

        let is_owner = identity.is_owner_of(&state, &room);
        let guest = (!is_owner).then_some(identity.voter_id);
        let listener_id = ListenerId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        // 구독을 먼저 끝내야 아래 발행을 놓치지 않는다
        state.bus.subscribe_guest(&room, listener_id, tx.clone());
        if is_owner {
            state.bus.subscribe_host(&room, listener_id, tx.clone());
        }

        if let Some(voter_id) = guest {
            register_presence(&state, &room, voter_id);
        }
        send_current_status(&state, &room, &tx);

        let heartbeat = tokio::spawn(heartbeat(state.clone(), room.clone(), guest, tx));

        tracing::info!(
            room = %room,
            listener = ?listener_id,
            owner = is_owner,
            "Room stream opened"
        );

        Ok((
            Self {
                state,
                room,
                listener_id,
                guest,
                heartbeat,
            },
            rx,
        ))
    }

    pub fn room(&self) -> &RoomUrlName {
        &self.room
    }

    pub fn is_owner(&self) -> bool {
        self.guest.is_none()
    }
}

impl Drop for RoomStream {
    fn drop(&mut self) {
        self.heartbeat.abort();

        if let Some(voter_id) = self.guest {
            if let Some(stats) = self.state.stats.remove_guest(&self.room, &voter_id) {
                self.state.bus.publish_host_stats(&self.room, stats);
            }
        }

        self.state.bus.unsubscribe_guest(&self.room, self.listener_id);
        if self.guest.is_none() {
            self.state.bus.unsubscribe_host(&self.room, self.listener_id);
        }

        tracing::info!(room = %self.room, listener = ?self.listener_id, "Room stream closed");
    }
}

fn register_presence(state: &AppState, room: &RoomUrlName, voter_id: VoterId) {
    let stats = state.stats.add_guest(room, voter_id);
    state.bus.publish_host_stats(room, stats);
}

fn send_current_status(state: &AppState, room: &RoomUrlName, tx: &UnboundedSender<RoomEvent>) {
    // 전송 실패는 무시 (정리는 연결 취소 쪽에서만)
    let _ = tx.send(RoomEvent::GuestRoomEvent(current_status(state, room)));
}

/// 주기적으로 현재 상태를 다시 보내고 게스트 등록을 갱신
async fn heartbeat(
    state: Arc<AppState>,
    room: RoomUrlName,
    guest: Option<VoterId>,
    tx: UnboundedSender<RoomEvent>,
) {
    let period = state.config.stream.heartbeat_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(voter_id) = guest {
            register_presence(&state, &room, voter_id);
        }
        send_current_status(&state, &room, &tx);
        tracing::trace!(room = %room, "Heartbeat sent");
    }
}

/// SSE 응답 본문. 스트림이 드롭되면 `RoomStream`도 드롭되어 정리된다.
pub struct RoomEventStream {
    events: UnboundedReceiver<RoomEvent>,
    _session: RoomStream,
}

impl RoomEventStream {
    pub fn new(session: RoomStream, events: UnboundedReceiver<RoomEvent>) -> Self {
        Self {
            events,
            _session: session,
        }
    }
}

impl Stream for RoomEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.events.poll_recv(cx) {
                Poll::Ready(Some(event)) => match Event::default().json_data(&event) {
                    Ok(frame) => return Poll::Ready(Some(Ok(frame))),
                    Err(err) => {
                        tracing::debug!(error = %err, "Skipping unserializable room event");
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::voting;
    use crate::protocol::{CurrentStats, GuestRoomEvent, Username, VoteChoice};
    use axum::http::{header, HeaderMap, HeaderValue};
    use std::time::Duration;

    const HEARTBEAT: Duration = Duration::from_secs(10);

    fn setup() -> (Arc<AppState>, RoomUrlName) {
        let mut config = Config::default();
        config.owner_sessions = vec![("host-token".to_string(), Username::new("host"))];
        config.stream.heartbeat_interval = HEARTBEAT;
        let state = Arc::new(AppState::in_memory(config));
        let room = state.directory.create_room("Room", &Username::new("host"));
        (state, room)
    }

    fn host(state: &AppState) -> Identity {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=host-token"));
        Identity::from_headers(&headers, state)
    }

    fn guest(state: &AppState) -> Identity {
        Identity::from_headers(&HeaderMap::new(), state)
    }

    fn drain(rx: &mut UnboundedReceiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn latest_host_stats(events: &[RoomEvent]) -> Option<CurrentStats> {
        events.iter().rev().find_map(|event| match event {
            RoomEvent::HostRoomStats(stats) => Some(stats.current_stats.clone()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn unknown_room_is_rejected() {
        let (state, _) = setup();
        let identity = guest(&state);
        let result = RoomStream::open(state, RoomUrlName::new("missing"), &identity);
        assert!(matches!(result, Err(VotingError::RoomNotFound)));
    }

    #[tokio::test]
    async fn first_event_is_current_status() {
        let (state, room) = setup();
        let identity = guest(&state);
        let (_stream, mut rx) = RoomStream::open(state, room, &identity).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![RoomEvent::GuestRoomEvent(GuestRoomEvent {
                status_message: "Waiting for host to start voting session.".to_string(),
                is_open: false,
                current_vote: None,
            })]
        );
    }

    #[tokio::test]
    async fn host_sees_guest_count_follow_connections() {
        let (state, room) = setup();
        let host_identity = host(&state);
        let (host_stream, mut host_rx) =
            RoomStream::open(state.clone(), room.clone(), &host_identity).unwrap();
        assert!(host_stream.is_owner());

        let mut guests = Vec::new();
        for _ in 0..3 {
            let identity = guest(&state);
            guests.push(RoomStream::open(state.clone(), room.clone(), &identity).unwrap());
        }
        assert_eq!(latest_host_stats(&drain(&mut host_rx)).unwrap().total_guests, 3);
        assert_eq!(state.bus.listener_counts(&room), (4, 1));

        drop(guests.pop());
        assert_eq!(latest_host_stats(&drain(&mut host_rx)).unwrap().total_guests, 2);
        assert_eq!(state.bus.listener_counts(&room), (3, 1));
    }

    #[tokio::test]
    async fn owner_is_not_counted_as_guest() {
        let (state, room) = setup();
        let identity = host(&state);
        let (_stream, _rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();

        assert_eq!(state.stats.stats(&room).total_guests, 0);
    }

    #[tokio::test]
    async fn guest_never_receives_host_stats() {
        let (state, room) = setup();
        let identity = guest(&state);
        let (_stream, mut rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();

        state.bus.publish_host_stats(&room, CurrentStats::default());

        assert!(drain(&mut rx)
            .iter()
            .all(|event| matches!(event, RoomEvent::GuestRoomEvent(_))));
    }

    #[tokio::test]
    async fn dropping_stream_unsubscribes_everything() {
        let (state, room) = setup();
        let host_identity = host(&state);
        let guest_identity = guest(&state);
        let owner = RoomStream::open(state.clone(), room.clone(), &host_identity).unwrap();
        let visitor = RoomStream::open(state.clone(), room.clone(), &guest_identity).unwrap();

        drop(owner);
        drop(visitor);

        assert_eq!(state.bus.listener_counts(&room), (0, 0));
        assert_eq!(state.stats.stats(&room).total_guests, 0);
    }

    #[tokio::test]
    async fn voter_sees_own_vote_without_waiting() {
        let (state, room) = setup();
        let host_identity = host(&state);
        voting::open_room(&state, &room, &host_identity).unwrap();
        voting::request_vote(&state, &room, &host_identity, "Ship it?").unwrap();

        let identity = guest(&state);
        let (_stream, mut rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();
        drain(&mut rx);

        voting::cast_vote(&state, &room, identity.voter_id, VoteChoice::For).unwrap();

        match drain(&mut rx).as_slice() {
            [RoomEvent::GuestRoomEvent(event)] => {
                let vote = event.current_vote.as_ref().unwrap();
                assert_eq!(vote.question_text, "Ship it?");
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_resends_status() {
        let (state, room) = setup();
        let identity = guest(&state);
        let (_stream, mut rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();
        drain(&mut rx);

        let host_identity = host(&state);
        state.directory.open_room(&room, host_identity.user.as_ref().unwrap());

        let started = Instant::now();
        let event = rx.recv().await.unwrap();
        assert!(started.elapsed() >= HEARTBEAT);
        assert_eq!(
            event,
            RoomEvent::GuestRoomEvent(GuestRoomEvent {
                status_message: "Voting session started.".to_string(),
                is_open: true,
                current_vote: None,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_restores_dropped_presence() {
        let (state, room) = setup();
        let identity = guest(&state);
        let (_stream, mut rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();
        drain(&mut rx);

        state.stats.remove_guest(&room, &identity.voter_id);
        assert_eq!(state.stats.stats(&room).total_guests, 0);

        rx.recv().await.unwrap();
        assert_eq!(state.stats.stats(&room).total_guests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_after_close() {
        let (state, room) = setup();
        let identity = guest(&state);
        let (stream, mut rx) = RoomStream::open(state.clone(), room.clone(), &identity).unwrap();
        drain(&mut rx);

        drop(stream);
        tokio::time::sleep(HEARTBEAT * 3).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.stats.stats(&room).total_guests, 0);
    }
}
