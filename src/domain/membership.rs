use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::UnknownTierError;

/// 標準の貸出期間（日数）
pub const STANDARD_LOAN_WINDOW_DAYS: i64 = 14;

/// 会員種別（閉じた集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipTier {
    Student,
    Faculty,
    Regular,
    Premium,
}

/// 会員種別ごとの規定値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipPolicy {
    pub duration_years: u32,
    pub borrowing_limit: u32,
    pub daily_fine_rate: Decimal,
}

impl MembershipTier {
    pub const ALL: [MembershipTier; 4] = [
        MembershipTier::Student,
        MembershipTier::Faculty,
        MembershipTier::Regular,
        MembershipTier::Premium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Student => "STUDENT",
            MembershipTier::Faculty => "FACULTY",
            MembershipTier::Regular => "REGULAR",
            MembershipTier::Premium => "PREMIUM",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MembershipTier::Student => "Student",
            MembershipTier::Faculty => "Faculty",
            MembershipTier::Regular => "Regular",
            MembershipTier::Premium => "Premium",
        }
    }

    pub fn policy(&self) -> MembershipPolicy {
        policy_for(*self)
    }
}

impl FromStr for MembershipTier {
    type Err = UnknownTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        MembershipTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| UnknownTierError(s.to_string()))
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 純粋関数：会員種別の規定値を返す
///
/// | 種別 | 期間 | 上限 | 延滞料/日 |
/// |---|---|---|---|
/// | Student | 1年 | 5冊 | 0.50 |
/// | Faculty | 2年 | 10冊 | 0.25 |
/// | Regular | 1年 | 3冊 | 1.00 |
/// | Premium | 2年 | 15冊 | 0.10 |
pub fn policy_for(tier: MembershipTier) -> MembershipPolicy {
    match tier {
        MembershipTier::Student => MembershipPolicy {
            duration_years: 1,
            borrowing_limit: 5,
            daily_fine_rate: Decimal::new(50, 2),
        },
        MembershipTier::Faculty => MembershipPolicy {
            duration_years: 2,
            borrowing_limit: 10,
            daily_fine_rate: Decimal::new(25, 2),
        },
        MembershipTier::Regular => MembershipPolicy {
            duration_years: 1,
            borrowing_limit: 3,
            daily_fine_rate: Decimal::new(100, 2),
        },
        MembershipTier::Premium => MembershipPolicy {
            duration_years: 2,
            borrowing_limit: 15,
            daily_fine_rate: Decimal::new(10, 2),
        },
    }
}

/// 純粋関数：全会員種別とその規定値（定義順）
pub fn membership_catalogue() -> Vec<(MembershipTier, MembershipPolicy)> {
    MembershipTier::ALL
        .into_iter()
        .map(|tier| (tier, policy_for(tier)))
        .collect()
}

/// 文字列の会員種別から規定値を引く
///
/// 未知の種別は既定値に落とさず`UnknownTierError`にする。
pub fn policy_for_name(tier: &str) -> Result<MembershipPolicy, UnknownTierError> {
    tier.parse::<MembershipTier>().map(policy_for)
}

impl MembershipPolicy {
    /// 会員期間の終了日時
    ///
    /// 月単位で加算するため、2/29開始は翌年2/28に丸められる。
    pub fn membership_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_months(Months::new(self.duration_years * 12))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 貸出期間：会員期間と標準貸出期間の短い方
    pub fn loan_period(&self, window_days: i64) -> Duration {
        let window = Duration::days(window_days);
        let membership = Duration::days(i64::from(self.duration_years) * 365);
        window.min(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_every_tier_has_positive_limit_and_non_negative_rate() {
        for tier in MembershipTier::ALL {
            let policy = policy_for(tier);
            assert!(policy.borrowing_limit > 0, "{tier} limit");
            assert!(policy.daily_fine_rate >= Decimal::ZERO, "{tier} rate");
            assert!(policy.duration_years > 0, "{tier} duration");
        }
    }

    #[test]
    fn test_student_policy() {
        let policy = policy_for(MembershipTier::Student);
        assert_eq!(policy.duration_years, 1);
        assert_eq!(policy.borrowing_limit, 5);
        assert_eq!(policy.daily_fine_rate, Decimal::new(50, 2));
    }

    #[test]
    fn test_catalogue_lists_every_tier_in_order() {
        let catalogue = membership_catalogue();

        let tiers: Vec<MembershipTier> = catalogue.iter().map(|(tier, _)| *tier).collect();
        assert_eq!(tiers, MembershipTier::ALL.to_vec());
        assert_eq!(catalogue[3].1, policy_for(MembershipTier::Premium));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("student".parse::<MembershipTier>(), Ok(MembershipTier::Student));
        assert_eq!("Faculty".parse::<MembershipTier>(), Ok(MembershipTier::Faculty));
        assert_eq!(" PREMIUM ".parse::<MembershipTier>(), Ok(MembershipTier::Premium));
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        let result = policy_for_name("GOLD");
        assert_eq!(result.unwrap_err(), UnknownTierError("GOLD".to_string()));
    }

    #[test]
    fn test_membership_end_adds_whole_years() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let end = policy_for(MembershipTier::Faculty).membership_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_membership_end_from_leap_day() {
        let start = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let end = policy_for(MembershipTier::Regular).membership_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_loan_period_is_capped_by_window() {
        let policy = policy_for(MembershipTier::Student);
        assert_eq!(
            policy.loan_period(STANDARD_LOAN_WINDOW_DAYS),
            Duration::days(14)
        );
        assert_eq!(policy.loan_period(1000), Duration::days(365));
    }

    #[test]
    fn test_tier_serializes_upper_case() {
        let json = serde_json::to_value(MembershipTier::Premium).unwrap();
        assert_eq!(json, serde_json::json!("PREMIUM"));
    }
}
