use crate::domain::membership::STANDARD_LOAN_WINDOW_DAYS;
use crate::ports::{BookAvailability, Clock, DocumentStore, SequenceSource};
use serde::Deserialize;
use std::sync::Arc;

use super::locks::MemberLocks;

/// 既定の書き込み試行回数（version競合時の再試行を含む）
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

/// 貸出ルールの運用設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LendingSettings {
    /// 標準貸出期間（日数）
    pub loan_window_days: i64,
    /// read-modify-writeの最大試行回数
    pub max_write_attempts: u32,
}

impl Default for LendingSettings {
    fn default() -> Self {
        Self {
            loan_window_days: STANDARD_LOAN_WINDOW_DAYS,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// ライフサイクル操作はこの構造体を受け取る関数として実装する。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn DocumentStore>,
    pub sequences: Arc<dyn SequenceSource>,
    pub books: Arc<dyn BookAvailability>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<MemberLocks>,
    pub settings: LendingSettings,
}

impl ServiceDependencies {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sequences: Arc<dyn SequenceSource>,
        books: Arc<dyn BookAvailability>,
        clock: Arc<dyn Clock>,
        settings: LendingSettings,
    ) -> Self {
        Self {
            store,
            sequences,
            books,
            clock,
            locks: Arc::new(MemberLocks::new()),
            settings,
        }
    }
}
