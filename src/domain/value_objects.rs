use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UUIDを包むID値オブジェクトを定義する
///
/// ストレージの主キーとして使うIDで、業務番号（会員番号など）とは別物。
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// 会員ID
    MemberId
);

entity_id!(
    /// 書籍ID - カタログ管理コンテキストへの参照
    BookId
);

entity_id!(
    /// 貸出ID
    BorrowingId
);

entity_id!(
    /// 予約ID
    ReservationId
);

/// 金額エラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// 負の金額
    Negative(Decimal),
    /// 残高を超える精算
    ExceedsBalance { requested: Decimal, balance: Decimal },
    /// 表現できる範囲を超える
    Overflow,
}

/// 罰金額
///
/// 不変条件：0以上。
/// 型で強制し、負の残高を作れないようにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FineAmount(Decimal);

impl FineAmount {
    pub const ZERO: FineAmount = FineAmount(Decimal::ZERO);

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// 加算
    ///
    /// # エラー
    /// `Decimal`の範囲を超える場合は`AmountError::Overflow`
    pub fn add(self, other: FineAmount) -> Result<FineAmount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(FineAmount)
            .ok_or(AmountError::Overflow)
    }

    /// 減算
    ///
    /// # エラー
    /// `other`が現在額を超える場合は`AmountError::ExceedsBalance`
    pub fn subtract(self, other: FineAmount) -> Result<FineAmount, AmountError> {
        if other.0 > self.0 {
            return Err(AmountError::ExceedsBalance {
                requested: other.0,
                balance: self.0,
            });
        }
        Ok(FineAmount(self.0 - other.0))
    }
}

impl Default for FineAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for FineAmount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(value))
    }
}

impl From<FineAmount> for Decimal {
    fn from(amount: FineAmount) -> Self {
        amount.0
    }
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Negative(v) => write!(f, "amount must not be negative: {}", v),
            AmountError::ExceedsBalance { requested, balance } => {
                write!(f, "amount {} exceeds balance {}", requested, balance)
            }
            AmountError::Overflow => f.write_str("amount is too large"),
        }
    }
}

impl fmt::Display for FineAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
