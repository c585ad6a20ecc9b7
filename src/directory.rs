//! 방/세션 저장소 인터페이스

use crate::protocol::{RoomUrlName, Username};
use dashmap::DashMap;

/// 방과 세션을 영속 저장하는 외부 협력자
///
/// 모든 조회는 동기이며 부작용이 없다.
pub trait RoomDirectory: Send + Sync {
    fn room_name(&self, room: &RoomUrlName) -> Option<String>;

    fn is_room_open(&self, room: &RoomUrlName) -> Option<bool>;

    fn is_owner(&self, user: &Username, room: &RoomUrlName) -> bool;

    /// 소유자가 맞을 때만 방을 열고 `true`
    fn open_room(&self, room: &RoomUrlName, owner: &Username) -> bool;

    /// 닫힌 상태의 새 방 생성
    fn create_room(&self, name: &str, owner: &Username) -> RoomUrlName;

    fn session_user(&self, token: &str) -> Option<Username>;
}

#[derive(Debug, Clone)]
struct RoomRecord {
    name: String,
    owner: Username,
    is_open: bool,
}

/// 메모리 기반 구현
#[derive(Default)]
pub struct InMemoryDirectory {
    rooms: DashMap<RoomUrlName, RoomRecord>,
    sessions: DashMap<String, Username>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 토큰 목록으로 초기화
    pub fn with_sessions<I>(sessions: I) -> Self
    where
        I: IntoIterator<Item = (String, Username)>,
    {
        let directory = Self::new();
        for (token, user) in sessions {
            directory.sessions.insert(token, user);
        }
        directory
    }

    #[cfg(test)]
    pub fn insert_session(&self, token: impl Into<String>, user: Username) {
        self.sessions.insert(token.into(), user);
    }
}

impl RoomDirectory for InMemoryDirectory {
    fn room_name(&self, room: &RoomUrlName) -> Option<String> {
        self.rooms.get(room).map(|record| record.name.clone())
    }

    fn is_room_open(&self, room: &RoomUrlName) -> Option<bool> {
        self.rooms.get(room).map(|record| record.is_open)
    }

    fn is_owner(&self, user: &Username, room: &RoomUrlName) -> bool {
        self.rooms
            .get(room)
            .map(|record| &record.owner == user)
            .unwrap_or(false)
    }

    fn open_room(&self, room: &RoomUrlName, owner: &Username) -> bool {
        match self.rooms.get_mut(room) {
            Some(mut record) if &record.owner == owner => {
                record.is_open = true;
                true
            }
            _ => false,
        }
    }

    fn create_room(&self, name: &str, owner: &Username) -> RoomUrlName {
        let url_name = RoomUrlName::generate();
        self.rooms.insert(
            url_name.clone(),
            RoomRecord {
                name: name.to_string(),
                owner: owner.clone(),
                is_open: false,
            },
        );
        url_name
    }

    fn session_user(&self, token: &str) -> Option<Username> {
        self.sessions.get(token).map(|user| user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_rooms_start_closed() {
        let directory = InMemoryDirectory::new();
        let alice = Username::new("alice");
        let room = directory.create_room("Standup", &alice);

        assert_eq!(directory.room_name(&room).as_deref(), Some("Standup"));
        assert_eq!(directory.is_room_open(&room), Some(false));
        assert!(directory.is_owner(&alice, &room));
    }

    #[test]
    fn only_owner_can_open() {
        let directory = InMemoryDirectory::new();
        let alice = Username::new("alice");
        let room = directory.create_room("Standup", &alice);

        assert!(!directory.open_room(&room, &Username::new("mallory")));
        assert_eq!(directory.is_room_open(&room), Some(false));
        assert!(directory.open_room(&room, &alice));
        assert_eq!(directory.is_room_open(&room), Some(true));
    }

    #[test]
    fn unknown_room_is_absent() {
        let directory = InMemoryDirectory::new();
        let missing = RoomUrlName::new("nope");

        assert!(directory.room_name(&missing).is_none());
        assert!(directory.is_room_open(&missing).is_none());
        assert!(!directory.is_owner(&Username::new("alice"), &missing));
        assert!(!directory.open_room(&missing, &Username::new("alice")));
    }

    #[test]
    fn sessions_resolve_to_users() {
        let directory =
            InMemoryDirectory::with_sessions([("token-1".to_string(), Username::new("alice"))]);
        directory.insert_session("token-2", Username::new("bob"));

        assert_eq!(directory.session_user("token-1"), Some(Username::new("alice")));
        assert_eq!(directory.session_user("token-2"), Some(Username::new("bob")));
        assert!(directory.session_user("token-3").is_none());
    }
}
