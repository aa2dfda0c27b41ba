use crate::domain::{
    AmountError, BookId, BorrowingId, FineError, MemberId, ReservationTransitionError,
    ReturnBookError, UnknownTierError,
};
use crate::ports::{CollectionKind, StoreError};
use thiserror::Error;
use uuid::Uuid;

/// 貸出ルールのアプリケーション層エラー
///
/// いずれも呼び出し側で回復可能。エラー種別と対象IDを持ち、
/// 呼び出し側（HTTP層など）が正確なメッセージを組み立てられるようにする。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 対象が存在しない
    #[error("{entity} not found: {id}")]
    NotFound { entity: CollectionKind, id: Uuid },

    /// メールアドレスが登録済み
    #[error("email already registered: {email}")]
    DuplicateEmail { email: String },

    /// 未知の会員種別
    #[error(transparent)]
    UnknownTier(#[from] UnknownTierError),

    /// 会員が無効
    #[error("member {member_id} is not active")]
    MemberInactive { member_id: MemberId },

    /// 貸出上限に達している
    #[error("borrowing limit of {limit} reached for member {member_id}")]
    BorrowingLimitExceeded { member_id: MemberId, limit: u32 },

    /// 貸出可能な複本がない
    #[error("book {book_id} has no available copy")]
    BookUnavailable { book_id: BookId },

    /// 既に返却済み
    #[error("borrowing {borrowing_id} is already returned")]
    AlreadyReturned { borrowing_id: BorrowingId },

    /// 状態遷移が不正
    #[error("{entity} {id} is in state {status}")]
    InvalidState {
        entity: CollectionKind,
        id: Uuid,
        status: String,
    },

    /// 金額が不正（負の値、残高超過、桁あふれ）
    #[error("invalid amount: {0}")]
    InvalidAmount(AmountError),

    /// 入力値の検証エラー
    #[error("validation failed: {0}")]
    Validation(String),

    /// ストレージのエラー
    #[error("storage error")]
    Store(#[from] StoreError),

    /// 蔵書在庫サービスのエラー
    #[error("book availability service failed")]
    BookService(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LendingError {
    pub fn not_found(entity: CollectionKind, id: Uuid) -> Self {
        LendingError::NotFound { entity, id }
    }

    pub(crate) fn invalid_reservation_state(id: Uuid, err: ReservationTransitionError) -> Self {
        LendingError::InvalidState {
            entity: CollectionKind::Reservation,
            id,
            status: err.current.as_str().to_string(),
        }
    }

    pub(crate) fn from_return(borrowing_id: BorrowingId, err: ReturnBookError) -> Self {
        match err {
            ReturnBookError::AlreadyReturned => LendingError::AlreadyReturned { borrowing_id },
            ReturnBookError::InvalidFine(e) => LendingError::InvalidAmount(e),
        }
    }
}

impl From<FineError> for LendingError {
    fn from(err: FineError) -> Self {
        match err {
            FineError::InvalidAmount(e) => LendingError::InvalidAmount(e),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
