use chrono::{DateTime, Utc};

/// 時計ポート
///
/// 延滞・罰金計算を決定的にテストできるよう注入する。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
