//! 애플리케이션 상태 관리

use crate::bus::EventBus;
use crate::config::Config;
use crate::directory::{InMemoryDirectory, RoomDirectory};
use crate::stats::RoomStatsStore;
use std::sync::Arc;

/// 전역 애플리케이션 상태 (프로세스 수명 동안 유지)
pub struct AppState {
    /// 방별 투표 상태
    pub stats: RoomStatsStore,
    /// 방별 이벤트 구독
    pub bus: EventBus,
    /// 방/세션 저장소
    pub directory: Arc<dyn RoomDirectory>,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, directory: Arc<dyn RoomDirectory>) -> Self {
        Self {
            stats: RoomStatsStore::new(),
            bus: EventBus::new(),
            directory,
            config: Arc::new(config),
        }
    }

    /// 설정의 세션 목록으로 메모리 저장소 구성
    pub fn in_memory(config: Config) -> Self {
        let directory = InMemoryDirectory::with_sessions(config.owner_sessions.clone());
        Self::new(config, Arc::new(directory))
    }
}
