//! 记忆层：目标执行记录的存取（内存 / JSON 文件）

pub mod persistence;
pub mod store;

pub use persistence::JsonFileStore;
pub use store::{GoalRecord, InMemoryStore, MemoryStore};
