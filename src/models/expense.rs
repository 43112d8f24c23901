use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;

/// 分摊策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    Equal,
    Custom,
    Percent,
    Shares,
}

impl FromStr for SplitStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equal" => Ok(SplitStrategy::Equal),
            "custom" => Ok(SplitStrategy::Custom),
            "percent" => Ok(SplitStrategy::Percent),
            "shares" => Ok(SplitStrategy::Shares),
            other => Err(AppError::InvalidSplit(other.to_string())),
        }
    }
}

/// 账目类型：普通支出或结算转账
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    Expense,
    Settlement,
}

impl Default for ExpenseKind {
    fn default() -> Self {
        ExpenseKind::Expense
    }
}

/// 单个成员的分摊份额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub user_id: String,
    pub amount: Decimal,
}

/// 群组账目，创建后不可变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    #[serde(with = "crate::utils::serde_helpers::record_id")]
    pub id: String,
    pub group_id: String,
    pub payer_id: String,
    pub amount: Decimal,
    pub split_strategy: SplitStrategy,
    #[serde(default)]
    pub kind: ExpenseKind,
    pub shares: Vec<ExpenseShare>,
    pub notes: Option<String>,
    pub receipt_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 策略相关的分摊输入：custom 用 amount，percent 用 percent，shares 用 weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawShare {
    pub user_id: String,
    pub amount: Option<Decimal>,
    pub percent: Option<Decimal>,
    pub weight: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    pub group_id: Option<String>,
    pub amount: Decimal,
    pub split_strategy: String,
    #[serde(default)]
    pub shares: Vec<RawShare>,
    #[validate(length(max = 500, message = "Notes are too long"))]
    pub notes: Option<String>,
    pub receipt_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SettleUpRequest {
    pub group_id: Option<String>,
    pub to_user_id: String,
    pub amount: Decimal,
    #[validate(length(max = 500, message = "Notes are too long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseListQuery {
    pub group_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub group_id: Option<String>,
}
