use thiserror::Error;

use super::{AmountError, ReservationStatus};

/// 未知の会員種別
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown membership tier: {0}")]
pub struct UnknownTierError(pub String);

/// 罰金操作のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FineError {
    InvalidAmount(AmountError),
}

impl From<AmountError> for FineError {
    fn from(err: AmountError) -> Self {
        FineError::InvalidAmount(err)
    }
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 既に返却済み
    AlreadyReturned,
    /// 罰金額を計算できない
    InvalidFine(AmountError),
}

/// 予約の状態遷移エラー
///
/// PENDING以外からの遷移はすべて不正。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationTransitionError {
    pub current: ReservationStatus,
}

