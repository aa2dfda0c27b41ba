use crate::domain::{self, Borrowing};
use crate::ports::StoreError;
use tracing::{debug, info};

use super::dependencies::ServiceDependencies;
use super::errors::Result;
use super::repository;

/// 延滞検出バッチ
///
/// 返却期限を過ぎたACTIVEの貸出に、保存済みステータスとしてOVERDUEを記録する。
/// 読み出し側は常にステータスを導出し直すので、このバッチは最適化にすぎない。
///
/// ビジネスルール：
/// - 既にOVERDUEの貸出は処理しない
/// - 返却済みの貸出は処理しない
/// - 書き込みが競合した貸出（同時に返却されたなど）はスキップする
///
/// # 戻り値
/// OVERDUEとして記録した貸出の件数
#[tracing::instrument(skip(deps))]
pub async fn detect_overdue_borrowings(deps: &ServiceDependencies) -> Result<usize> {
    let now = deps.clock.now();
    let mut flagged = 0;

    let borrowings = repository::load_all::<Borrowing>(deps.store.as_ref()).await?;

    for current in borrowings {
        let Some(overdue) = domain::borrowing::mark_overdue(&current.entity, now) else {
            continue;
        };

        match repository::update(deps.store.as_ref(), &current, overdue).await {
            Ok(saved) => {
                debug!(
                    borrowing_id = %saved.entity.id,
                    due_date = %saved.entity.due_date,
                    "borrowing flagged overdue"
                );
                flagged += 1;
            }
            Err(StoreError::VersionConflict { id, .. }) => {
                debug!(borrowing_id = %id, "borrowing changed during sweep, skipped");
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(flagged, "overdue sweep finished");
    Ok(flagged)
}
