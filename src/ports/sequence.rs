use crate::domain::IdentifierKind;
use async_trait::async_trait;

use super::document_store::Result;

/// 連番ソースポート
///
/// 種類ごとに単調増加する値を返す。並行呼び出しでも同じ値を二度返さないこと。
/// 「存在確認してから採番」は競合するため使わない。
#[async_trait]
pub trait SequenceSource: Send + Sync {
    async fn next_value(&self, kind: IdentifierKind) -> Result<u64>;
}
