//! JSON 파일 저장소 (설정 계층용)

mod store;

pub use store::JsonStore;
