//! Impls - ports の実装
//!
//! - **SimulatedWork**: 既定の UnitOfWork（sleep + 乱数で失敗）
//! - **FnListener / NoopListener**: TaskListener
//! - （テスト用）scripted: 決定的に成功・失敗する UnitOfWork と記録用 Listener

pub mod listener;
pub mod simulated;

#[cfg(test)]
pub(crate) mod scripted;

pub use self::listener::{FnListener, NoopListener};
pub use self::simulated::SimulatedWork;
