use crate::domain::MemberId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 会員ごとの直列化ポイント
///
/// 同じ会員に対する貸出・返却・予約受け取り・取り消しを1つずつ実行させる。
/// 貸出上限のチェックと貸出作成の間に、他の貸出が割り込まないことを保証する。
#[derive(Debug, Default)]
pub struct MemberLocks {
    locks: Mutex<HashMap<MemberId, Arc<AsyncMutex<()>>>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会員のロックを取得する
    ///
    /// ガードを落とすまで、同じ会員に対する他の`acquire`は待たされる。
    pub async fn acquire(&self, member_id: MemberId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // 誰も保持・待機していないエントリは捨てる
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(member_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
