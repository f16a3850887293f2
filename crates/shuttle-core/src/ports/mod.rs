//! Ports - 差し替え可能な外部能力
//!
//! - **UnitOfWork**: 1 回の試行を実行する（本番ではシミュレーション、テストではスクリプト）
//! - **TaskListener**: 成功・失敗の通知先（ログ、HTTP アダプタなど）

pub mod listener;
pub mod unit_of_work;

pub use self::listener::TaskListener;
pub use self::unit_of_work::{UnitOfWork, WorkItem};
