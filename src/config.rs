//! 환경 변수 기반 설정 관리

use crate::protocol::Username;
use std::env;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub stream: StreamConfig,
    /// `token:username` 쌍 (세션 테이블 초기값)
    pub owner_sessions: Vec<(String, Username)>,
    /// 형식이 틀려 버려진 `OWNER_SESSIONS` 항목 (로깅 초기화 후 경고용)
    pub rejected_owner_sessions: Vec<String>,
    pub log_level: String,
}

/// 이벤트 스트림 설정
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub heartbeat_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            stream: StreamConfig::default(),
            owner_sessions: Vec::new(),
            rejected_owner_sessions: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let OwnerSessions { accepted, rejected } =
            parse_owner_sessions(&env::var("OWNER_SESSIONS").unwrap_or_default());

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            stream: StreamConfig {
                heartbeat_interval: Duration::from_secs(
                    env::var("HEARTBEAT_INTERVAL_SECS")
                        .unwrap_or_else(|_| "10".to_string())
                        .parse()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .unwrap_or(10),
                ),
            },
            owner_sessions: accepted,
            rejected_owner_sessions: rejected,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct OwnerSessions {
    accepted: Vec<(String, Username)>,
    rejected: Vec<String>,
}

/// `token:username` 목록 파싱. 빈 항목은 건너뛴다.
fn parse_owner_sessions(raw: &str) -> OwnerSessions {
    let mut sessions = OwnerSessions::default();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        match entry.split_once(':') {
            Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                sessions
                    .accepted
                    .push((token.trim().to_string(), Username::new(user.trim())));
            }
            _ => sessions.rejected.push(entry.to_string()),
        }
    }
    sessions
}
