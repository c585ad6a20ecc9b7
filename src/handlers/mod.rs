//! 핸들러 모듈

pub mod room;
pub mod stream;
pub mod voting;

pub use room::*;
pub use stream::*;
pub use voting::*;
