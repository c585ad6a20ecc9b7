//! 서버 → 클라이언트 프로토콜

pub mod messages;

pub use messages::*;
