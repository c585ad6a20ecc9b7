//! 방별 이벤트 팬아웃 버스
//!
//! 방마다 두 채널을 둔다.
//! - 게스트 채널: 방의 모든 연결(호스트 포함)이 받는다.
//! - 호스트 채널: 방 소유자 연결만 받는다.

use crate::protocol::{
    CurrentStats, GuestRoomEvent, HostRoomStats, PreviousVoteSummary, RoomEvent, RoomUrlName,
    VoteSummary,
};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 리스너 = 연결별 송신 채널
pub type Listener = UnboundedSender<RoomEvent>;

/// 구독 해제용 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct RoomChannels {
    guests: HashMap<ListenerId, Listener>,
    hosts: HashMap<ListenerId, Listener>,
    last_guest_event: Option<GuestRoomEvent>,
}

/// 타입 기반 구독 레지스트리
#[derive(Default)]
pub struct EventBus {
    rooms: DashMap<RoomUrlName, RoomChannels>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_guest(&self, room: &RoomUrlName, id: ListenerId, listener: Listener) {
        self.rooms
            .entry(room.clone())
            .or_default()
            .guests
            .insert(id, listener);
        tracing::debug!(room = %room, listener = ?id, "Guest listener subscribed");
    }

    pub fn unsubscribe_guest(&self, room: &RoomUrlName, id: ListenerId) {
        if let Some(mut channels) = self.rooms.get_mut(room) {
            channels.guests.remove(&id);
        }
        tracing::debug!(room = %room, listener = ?id, "Guest listener unsubscribed");
    }

    pub fn subscribe_host(&self, room: &RoomUrlName, id: ListenerId, listener: Listener) {
        self.rooms
            .entry(room.clone())
            .or_default()
            .hosts
            .insert(id, listener);
        tracing::debug!(room = %room, listener = ?id, "Host listener subscribed");
    }

    pub fn unsubscribe_host(&self, room: &RoomUrlName, id: ListenerId) {
        if let Some(mut channels) = self.rooms.get_mut(room) {
            channels.hosts.remove(&id);
        }
        tracing::debug!(room = %room, listener = ?id, "Host listener unsubscribed");
    }

    /// 게스트 이벤트 발행 + 마지막 이벤트 캐시 갱신
    pub fn publish_guest_event(&self, room: &RoomUrlName, event: GuestRoomEvent) {
        let listeners = {
            let mut channels = self.rooms.entry(room.clone()).or_default();
            channels.last_guest_event = Some(event.clone());
            snapshot(&channels.guests)
        };
        deliver(room, &listeners, RoomEvent::GuestRoomEvent(event));
    }

    /// 이전 투표 요약 발행 (`None`은 요약 삭제 신호). 캐시에는 남기지 않는다.
    pub fn publish_previous_summary(&self, room: &RoomUrlName, summary: Option<VoteSummary>) {
        let listeners = self.guest_listeners(room);
        deliver(
            room,
            &listeners,
            RoomEvent::PreviousVoteSummary(PreviousVoteSummary {
                previous_vote_summary: summary,
            }),
        );
    }

    pub fn publish_host_stats(&self, room: &RoomUrlName, stats: CurrentStats) {
        let listeners = match self.rooms.get(room) {
            Some(channels) => snapshot(&channels.hosts),
            None => return,
        };
        deliver(
            room,
            &listeners,
            RoomEvent::HostRoomStats(HostRoomStats {
                current_stats: stats,
            }),
        );
    }

    /// 캐시된 마지막 게스트 이벤트를 현재 게스트 리스너에게 재전송
    pub fn replay_last_guest_event(&self, room: &RoomUrlName) {
        let (listeners, event) = match self.rooms.get(room) {
            Some(channels) => match &channels.last_guest_event {
                Some(event) => (snapshot(&channels.guests), event.clone()),
                None => return,
            },
            None => return,
        };
        deliver(room, &listeners, RoomEvent::GuestRoomEvent(event));
    }

    #[cfg(test)]
    pub fn last_guest_event(&self, room: &RoomUrlName) -> Option<GuestRoomEvent> {
        self.rooms.get(room)?.last_guest_event.clone()
    }

    #[cfg(test)]
    pub fn listener_counts(&self, room: &RoomUrlName) -> (usize, usize) {
        self.rooms
            .get(room)
            .map(|channels| (channels.guests.len(), channels.hosts.len()))
            .unwrap_or((0, 0))
    }

    fn guest_listeners(&self, room: &RoomUrlName) -> Vec<Listener> {
        self.rooms
            .get(room)
            .map(|channels| snapshot(&channels.guests))
            .unwrap_or_default()
    }
}

/// 락을 잡은 채로 전송하지 않도록 송신자 복사
fn snapshot(listeners: &HashMap<ListenerId, Listener>) -> Vec<Listener> {
    listeners.values().cloned().collect()
}

/// 리스너 하나의 실패가 나머지 전달을 막지 않는다
fn deliver(room: &RoomUrlName, listeners: &[Listener], event: RoomEvent) {
    for listener in listeners {
        if listener.send(event.clone()).is_err() {
            tracing::debug!(room = %room, "Dropped event for closed listener");
        }
    }
}
