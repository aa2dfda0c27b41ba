use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{FineAmount, FineError, MemberId, MembershipPolicy, MembershipTier, policy_for};

/// Member集約 - 図書館の会員
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    // 識別子
    pub id: MemberId,
    pub member_number: String,

    pub name: String,
    pub email: String,

    // 会員種別と期間
    pub tier: MembershipTier,
    pub membership_start: DateTime<Utc>,
    pub membership_end: DateTime<Utc>,

    pub active: bool,
    pub fine_balance: FineAmount,

    // 監査情報
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn policy(&self) -> MembershipPolicy {
        policy_for(self.tier)
    }
}

/// メールアドレスの正規化（前後の空白除去・小文字化）
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 純粋関数：会員を登録する
///
/// ビジネスルール：
/// - 会員期間の開始は登録日時
/// - 終了 = 開始 + 種別ごとの年数
/// - 有効状態、罰金残高0で開始
pub fn enroll(
    member_number: String,
    name: &str,
    email: &str,
    tier: MembershipTier,
    now: DateTime<Utc>,
) -> Member {
    Member {
        id: MemberId::new(),
        member_number,
        name: name.trim().to_string(),
        email: normalize_email(email),
        tier,
        membership_start: now,
        membership_end: policy_for(tier).membership_end(now),
        active: true,
        fine_balance: FineAmount::ZERO,
        created_at: now,
        updated_at: now,
    }
}

/// 純粋関数：会員種別を変更する
///
/// 終了日時は既存の開始日時から再計算する。開始日時は変えない。
pub fn change_tier(member: &Member, tier: MembershipTier, now: DateTime<Utc>) -> Member {
    Member {
        tier,
        membership_end: policy_for(tier).membership_end(member.membership_start),
        updated_at: now,
        ..member.clone()
    }
}

/// 純粋関数：氏名とメールアドレスを変更する
///
/// 会員番号・種別・期間・罰金残高は変えない。
pub fn update_profile(member: &Member, name: &str, email: &str, now: DateTime<Utc>) -> Member {
    Member {
        name: name.trim().to_string(),
        email: normalize_email(email),
        updated_at: now,
        ..member.clone()
    }
}

/// 純粋関数：罰金を加算する
pub fn assess_fine(
    member: &Member,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Member, FineError> {
    let amount = FineAmount::try_from(amount)?;
    let fine_balance = member.fine_balance.add(amount)?;

    Ok(Member {
        fine_balance,
        updated_at: now,
        ..member.clone()
    })
}

/// 純粋関数：罰金を精算する
///
/// 残高を超える支払いは受け付けない（負の残高にしない）。
pub fn settle_fine(
    member: &Member,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Member, FineError> {
    let amount = FineAmount::try_from(amount)?;
    let fine_balance = member.fine_balance.subtract(amount)?;

    Ok(Member {
        fine_balance,
        updated_at: now,
        ..member.clone()
    })
}

pub fn deactivate(member: &Member, now: DateTime<Utc>) -> Member {
    Member {
        active: false,
        updated_at: now,
        ..member.clone()
    }
}

pub fn reactivate(member: &Member, now: DateTime<Utc>) -> Member {
    Member {
        active: true,
        updated_at: now,
        ..member.clone()
    }
}
