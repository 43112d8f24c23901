use crate::{
    error::{AppError, Result},
    models::{
        expense::{
            CreateExpenseRequest, Expense, ExpenseKind, ExpenseShare, RawShare, SettleUpRequest,
            SplitStrategy,
        },
        notification::DispatchEvent,
    },
    services::{Database, GroupService, NotificationService, PaginatedResult},
};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 账本引擎：份额计算、账目落库、净余额聚合。
///
/// 余额是纯派生数据，每次查询全量重算。在目标规模（一个群组几十个成员、
/// 几百条账目）下单次扫描足够便宜；如果账目量级上去了，应该改成按写入
/// 增量维护的余额缓存，这里刻意没有做。
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<Database>,
    group_service: GroupService,
    notification_service: NotificationService,
}

/// 按成员ID升序计算份额，排序后的最后一个成员吸收凑整余差。
/// 所有策略的后置条件相同：份额总和与金额精确到分相等。
pub fn compute_shares(
    strategy: SplitStrategy,
    amount: Decimal,
    group_members: &[String],
    raw_shares: &[RawShare],
) -> Result<Vec<ExpenseShare>> {
    let shares = match strategy {
        SplitStrategy::Equal => compute_equal_shares(amount, group_members)?,
        SplitStrategy::Custom => compute_custom_shares(amount, group_members, raw_shares)?,
        SplitStrategy::Percent => compute_percent_shares(amount, group_members, raw_shares)?,
        SplitStrategy::Shares => compute_weighted_shares(amount, group_members, raw_shares)?,
    };

    let total: Decimal = shares.iter().map(|s| s.amount).sum();
    if total != amount {
        return Err(AppError::internal(&format!(
            "Share computation failed to reconcile: {} != {}",
            total, amount
        )));
    }

    Ok(shares)
}

fn compute_equal_shares(amount: Decimal, group_members: &[String]) -> Result<Vec<ExpenseShare>> {
    let mut members: Vec<String> = group_members.to_vec();
    members.sort();
    members.dedup();

    if members.is_empty() {
        return Err(AppError::InvalidSplit(
            "equal split over an empty group".to_string(),
        ));
    }

    let count = Decimal::from(members.len() as u64);
    let per_share = (amount / count).round_dp_with_strategy(2, RoundingStrategy::ToZero);

    let mut shares: Vec<ExpenseShare> = members
        .iter()
        .map(|user_id| ExpenseShare {
            user_id: user_id.clone(),
            amount: per_share,
        })
        .collect();

    // 最后一个成员吸收余差，保证总额精确等于 amount
    let allocated = per_share * Decimal::from((members.len() - 1) as u64);
    if let Some(last) = shares.last_mut() {
        last.amount = amount - allocated;
    }

    Ok(shares)
}

fn compute_custom_shares(
    amount: Decimal,
    group_members: &[String],
    raw_shares: &[RawShare],
) -> Result<Vec<ExpenseShare>> {
    if raw_shares.is_empty() {
        return Err(AppError::SharesRequired);
    }

    let entries = validated_entries(group_members, raw_shares)?;

    let mut shares = Vec::with_capacity(entries.len());
    for raw in &entries {
        let share_amount = raw.amount.ok_or_else(|| {
            AppError::validation("Each custom share needs an amount")
        })?;
        shares.push(ExpenseShare {
            user_id: raw.user_id.clone(),
            amount: share_amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        });
    }

    let total: Decimal = shares.iter().map(|s| s.amount).sum();
    if total != amount {
        return Err(AppError::SharesMismatch);
    }

    Ok(shares)
}

fn compute_percent_shares(
    amount: Decimal,
    group_members: &[String],
    raw_shares: &[RawShare],
) -> Result<Vec<ExpenseShare>> {
    let entries = validated_entries(group_members, raw_shares)?;

    let mut percents = Vec::with_capacity(entries.len());
    for raw in &entries {
        let percent = raw.percent.ok_or_else(|| {
            AppError::validation("Each percent share needs a percent")
        })?;
        percents.push((raw.user_id.clone(), percent));
    }

    let percent_total: Decimal = percents.iter().map(|(_, p)| *p).sum();
    if percent_total.round_dp(2) != Decimal::from(100) {
        return Err(AppError::PercentMismatch);
    }

    let hundred = Decimal::from(100);
    let mut shares: Vec<ExpenseShare> = percents
        .iter()
        .map(|(user_id, percent)| ExpenseShare {
            user_id: user_id.clone(),
            amount: (amount * *percent / hundred)
                .round_dp_with_strategy(2, RoundingStrategy::ToZero),
        })
        .collect();

    let allocated: Decimal = shares[..shares.len() - 1].iter().map(|s| s.amount).sum();
    if let Some(last) = shares.last_mut() {
        last.amount = amount - allocated;
    }

    Ok(shares)
}

fn compute_weighted_shares(
    amount: Decimal,
    group_members: &[String],
    raw_shares: &[RawShare],
) -> Result<Vec<ExpenseShare>> {
    let entries = validated_entries(group_members, raw_shares)?;

    let mut weights = Vec::with_capacity(entries.len());
    for raw in &entries {
        let weight = raw.weight.ok_or_else(|| {
            AppError::validation("Each weighted share needs a weight")
        })?;
        weights.push((raw.user_id.clone(), weight));
    }

    let weight_total: Decimal = weights.iter().map(|(_, w)| *w).sum();
    if weight_total <= Decimal::ZERO {
        return Err(AppError::InvalidSharesTotal);
    }

    let mut shares: Vec<ExpenseShare> = weights
        .iter()
        .map(|(user_id, weight)| ExpenseShare {
            user_id: user_id.clone(),
            amount: (amount * *weight / weight_total)
                .round_dp_with_strategy(2, RoundingStrategy::ToZero),
        })
        .collect();

    let allocated: Decimal = shares[..shares.len() - 1].iter().map(|s| s.amount).sum();
    if let Some(last) = shares.last_mut() {
        last.amount = amount - allocated;
    }

    Ok(shares)
}

/// 成员校验 + 去重检查 + 按用户ID排序（排序决定谁吸收余差）
fn validated_entries(group_members: &[String], raw_shares: &[RawShare]) -> Result<Vec<RawShare>> {
    let members: HashSet<&str> = group_members.iter().map(|m| m.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for raw in raw_shares {
        if !members.contains(raw.user_id.as_str()) {
            return Err(AppError::ShareMemberNotInGroup(raw.user_id.clone()));
        }
        if !seen.insert(raw.user_id.as_str()) {
            return Err(AppError::validation(&format!(
                "Duplicate share entry for user {}",
                raw.user_id
            )));
        }
    }

    let mut entries = raw_shares.to_vec();
    entries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    Ok(entries)
}

/// 付款人按全额记正、份额持有人按份额记负，逐用户求净值。
/// 账本是零和的：所有净值之和恒为零。
pub fn aggregate_balances(expenses: &[Expense]) -> BTreeMap<String, Decimal> {
    let mut balances: BTreeMap<String, Decimal> = BTreeMap::new();

    for expense in expenses {
        *balances.entry(expense.payer_id.clone()).or_default() += expense.amount;
        for share in &expense.shares {
            *balances.entry(share.user_id.clone()).or_default() -= share.amount;
        }
    }

    for amount in balances.values_mut() {
        *amount = amount.round_dp(2);
    }

    balances
}

/// 余额导出：表头 userId,amount，每行一个成员，金额固定两位小数
pub fn balances_to_csv(balances: &BTreeMap<String, Decimal>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(["userId", "amount"])
        .map_err(|e| AppError::internal(&format!("CSV write failed: {}", e)))?;

    for (user_id, amount) in balances {
        writer
            .write_record([user_id.as_str(), &format!("{:.2}", amount)])
            .map_err(|e| AppError::internal(&format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::internal(&format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::internal(&format!("CSV encoding failed: {}", e)))
}

fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount);
    }
    if amount != amount.round_dp(2) {
        return Err(AppError::validation("Amount has more than 2 decimal places"));
    }
    Ok(amount)
}

impl LedgerService {
    pub async fn new(
        db: Arc<Database>,
        group_service: GroupService,
        notification_service: NotificationService,
    ) -> Result<Self> {
        Ok(Self {
            db,
            group_service,
            notification_service,
        })
    }

    /// 创建一条账目。账目一经落库不可变更；校验失败时不会有任何部分写入。
    pub async fn create_expense(
        &self,
        payer_id: &str,
        group_id: &str,
        request: CreateExpenseRequest,
    ) -> Result<Expense> {
        debug!("Creating expense in group: {} by payer: {}", group_id, payer_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let amount = validate_amount(request.amount)?;
        let strategy = SplitStrategy::from_str(&request.split_strategy)?;

        let members = self.group_service.get_group_members(group_id).await?;
        if !members.iter().any(|m| m == payer_id) {
            return Err(AppError::PayerNotInGroup);
        }

        let shares = compute_shares(strategy, amount, &members, &request.shares)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            payer_id: payer_id.to_string(),
            amount,
            split_strategy: strategy,
            kind: ExpenseKind::Expense,
            shares,
            notes: request.notes,
            receipt_ref: request.receipt_ref,
            created_at: Utc::now(),
        };

        self.db.create_with_id("expense", &expense.id, &expense).await?;
        info!("Created expense: {} in group: {}", expense.id, group_id);

        // 通知其余成员；投递失败绝不回滚已落库的账目
        let targets: Vec<String> = members.into_iter().filter(|m| m != payer_id).collect();
        if !targets.is_empty() {
            let event = DispatchEvent::new(
                "expense.created",
                targets,
                "New group expense",
                &format!("A new expense of {:.2} was added to your group", expense.amount),
            )
            .with_data(json!({
                "expense_id": expense.id,
                "group_id": group_id,
                "payer_id": payer_id,
                "amount": expense.amount,
            }))
            .with_deeplink(&format!("/groups/{}/expenses/{}", group_id, expense.id));

            if let Err(e) = self.notification_service.dispatch(event).await {
                warn!("Failed to dispatch expense.created notifications: {}", e);
            }
        }

        Ok(expense)
    }

    /// 结算转账：建模成单收款人的 custom 分摊，但带 settlement 类型标记，
    /// 这样历史视图不用靠备注字符串就能把结算和消费分开
    pub async fn settle_up(
        &self,
        from_user_id: &str,
        group_id: &str,
        request: SettleUpRequest,
    ) -> Result<Expense> {
        debug!(
            "Settling up in group: {} from: {} to: {}",
            group_id, from_user_id, request.to_user_id
        );

        request.validate().map_err(AppError::ValidatorError)?;

        let amount = validate_amount(request.amount)?;

        let members = self.group_service.get_group_members(group_id).await?;
        if !members.iter().any(|m| m == from_user_id) {
            return Err(AppError::PayerNotInGroup);
        }
        if !members.iter().any(|m| m == &request.to_user_id) {
            return Err(AppError::ShareMemberNotInGroup(request.to_user_id.clone()));
        }

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            payer_id: from_user_id.to_string(),
            amount,
            split_strategy: SplitStrategy::Custom,
            kind: ExpenseKind::Settlement,
            shares: vec![ExpenseShare {
                user_id: request.to_user_id.clone(),
                amount,
            }],
            notes: request.notes.or_else(|| Some("Settle up".to_string())),
            receipt_ref: None,
            created_at: Utc::now(),
        };

        self.db.create_with_id("expense", &expense.id, &expense).await?;
        info!("Recorded settlement: {} in group: {}", expense.id, group_id);

        let event = DispatchEvent::new(
            "expense.settled",
            vec![request.to_user_id.clone()],
            "Settlement received",
            &format!("You received a settlement of {:.2}", amount),
        )
        .with_data(json!({
            "expense_id": expense.id,
            "group_id": group_id,
            "from_user_id": from_user_id,
            "amount": amount,
        }));

        if let Err(e) = self.notification_service.dispatch(event).await {
            warn!("Failed to dispatch expense.settled notification: {}", e);
        }

        Ok(expense)
    }

    /// 群组净余额：正数表示别人欠该用户，负数表示该用户欠别人
    pub async fn get_balances(&self, group_id: &str) -> Result<BTreeMap<String, Decimal>> {
        debug!("Computing balances for group: {}", group_id);

        // 群组不存在时报 GroupNotFound 而不是静默返回空表
        self.group_service.get_group(group_id).await?;

        let expenses = self.load_group_expenses(group_id).await?;
        Ok(aggregate_balances(&expenses))
    }

    pub async fn export_balances_csv(&self, group_id: &str) -> Result<String> {
        let balances = self.get_balances(group_id).await?;
        balances_to_csv(&balances)
    }

    pub async fn list_expenses_paginated(
        &self,
        group_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<PaginatedResult<Expense>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.db.config.default_page_size as i64)
            .clamp(1, self.db.config.max_page_size as i64);
        let offset = (page - 1) * limit;

        self.group_service.get_group(group_id).await?;

        let count_query = r#"
            SELECT count() AS total FROM expense
            WHERE group_id = $group_id
            GROUP ALL
        "#;
        let mut response = self
            .db
            .query_with_params(count_query, json!({ "group_id": group_id }))
            .await?;
        let counts: Vec<serde_json::Value> = response.take(0)?;
        let total = counts
            .first()
            .and_then(|v| v.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let list_query = r#"
            SELECT * FROM expense
            WHERE group_id = $group_id
            ORDER BY created_at DESC
            LIMIT $limit START $offset
        "#;
        let mut response = self
            .db
            .query_with_params(
                list_query,
                json!({ "group_id": group_id, "limit": limit, "offset": offset }),
            )
            .await?;
        let expenses: Vec<Expense> = response.take(0)?;

        let per_page = limit as usize;
        Ok(PaginatedResult {
            data: expenses,
            total,
            page: page as usize,
            per_page,
            total_pages: (total + per_page - 1) / per_page.max(1),
        })
    }

    async fn load_group_expenses(&self, group_id: &str) -> Result<Vec<Expense>> {
        let query = r#"
            SELECT * FROM expense
            WHERE group_id = $group_id
        "#;

        let mut response = self
            .db
            .query_with_params(query, json!({ "group_id": group_id }))
            .await?;
        let expenses: Vec<Expense> = response.take(0)?;
        Ok(expenses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn custom(user_id: &str, amount: Decimal) -> RawShare {
        RawShare {
            user_id: user_id.to_string(),
            amount: Some(amount),
            percent: None,
            weight: None,
        }
    }

    fn percent(user_id: &str, percent: Decimal) -> RawShare {
        RawShare {
            user_id: user_id.to_string(),
            amount: None,
            percent: Some(percent),
            weight: None,
        }
    }

    fn weighted(user_id: &str, weight: Decimal) -> RawShare {
        RawShare {
            user_id: user_id.to_string(),
            amount: None,
            percent: None,
            weight: Some(weight),
        }
    }

    fn expense(payer: &str, amount: Decimal, shares: &[(&str, Decimal)]) -> Expense {
        Expense {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: "g1".to_string(),
            payer_id: payer.to_string(),
            amount,
            split_strategy: SplitStrategy::Custom,
            kind: ExpenseKind::Expense,
            shares: shares
                .iter()
                .map(|(user_id, amount)| ExpenseShare {
                    user_id: user_id.to_string(),
                    amount: *amount,
                })
                .collect(),
            notes: None,
            receipt_ref: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_equal_split_last_member_absorbs_remainder() {
        let shares = compute_shares(
            SplitStrategy::Equal,
            dec!(100.00),
            &members(&["u1", "u2", "u3"]),
            &[],
        )
        .unwrap();

        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].amount, dec!(33.33));
        assert_eq!(shares[1].amount, dec!(33.33));
        assert_eq!(shares[2].amount, dec!(33.34));
        assert_eq!(shares[2].user_id, "u3");
    }

    #[test]
    fn test_equal_split_is_order_independent() {
        // 成员集合顺序不同，余差仍由排序后的最后一个成员吸收
        let shares = compute_shares(
            SplitStrategy::Equal,
            dec!(100.00),
            &members(&["u3", "u1", "u2"]),
            &[],
        )
        .unwrap();

        assert_eq!(shares[2].user_id, "u3");
        assert_eq!(shares[2].amount, dec!(33.34));
    }

    #[test]
    fn test_equal_split_exact_division() {
        let shares = compute_shares(
            SplitStrategy::Equal,
            dec!(90.00),
            &members(&["u1", "u2", "u3"]),
            &[],
        )
        .unwrap();

        assert!(shares.iter().all(|s| s.amount == dec!(30.00)));
    }

    #[test]
    fn test_equal_split_rejects_empty_group() {
        let result = compute_shares(SplitStrategy::Equal, dec!(10.00), &[], &[]);
        assert!(matches!(result, Err(AppError::InvalidSplit(_))));
    }

    #[test]
    fn test_custom_split_requires_shares() {
        let result = compute_shares(
            SplitStrategy::Custom,
            dec!(30.00),
            &members(&["u1", "u2"]),
            &[],
        );
        assert!(matches!(result, Err(AppError::SharesRequired)));
    }

    #[test]
    fn test_custom_split_rejects_mismatch() {
        let result = compute_shares(
            SplitStrategy::Custom,
            dec!(30.00),
            &members(&["u1", "u2"]),
            &[custom("u1", dec!(10.00))],
        );
        assert!(matches!(result, Err(AppError::SharesMismatch)));
    }

    #[test]
    fn test_custom_split_rejects_non_member() {
        let result = compute_shares(
            SplitStrategy::Custom,
            dec!(30.00),
            &members(&["u1", "u2"]),
            &[custom("stranger", dec!(30.00))],
        );
        assert!(matches!(result, Err(AppError::ShareMemberNotInGroup(_))));
    }

    #[test]
    fn test_custom_split_accepts_exact_sum() {
        let shares = compute_shares(
            SplitStrategy::Custom,
            dec!(30.00),
            &members(&["u1", "u2"]),
            &[custom("u2", dec!(20.00)), custom("u1", dec!(10.00))],
        )
        .unwrap();

        // 结果按用户ID排序
        assert_eq!(shares[0].user_id, "u1");
        assert_eq!(shares[0].amount, dec!(10.00));
        assert_eq!(shares[1].user_id, "u2");
        assert_eq!(shares[1].amount, dec!(20.00));
    }

    #[test]
    fn test_percent_split_reconciles_exactly() {
        let shares = compute_shares(
            SplitStrategy::Percent,
            dec!(90.00),
            &members(&["u1", "u2"]),
            &[percent("u1", dec!(50)), percent("u2", dec!(50))],
        )
        .unwrap();

        let total: Decimal = shares.iter().map(|s| s.amount).sum();
        assert_eq!(total, dec!(90.00));
        assert_eq!(shares[0].amount, dec!(45.00));
        assert_eq!(shares[1].amount, dec!(45.00));
    }

    #[test]
    fn test_percent_split_uneven_remainder() {
        let shares = compute_shares(
            SplitStrategy::Percent,
            dec!(100.00),
            &members(&["u1", "u2", "u3"]),
            &[
                percent("u1", dec!(33.33)),
                percent("u2", dec!(33.33)),
                percent("u3", dec!(33.34)),
            ],
        )
        .unwrap();

        let total: Decimal = shares.iter().map(|s| s.amount).sum();
        assert_eq!(total, dec!(100.00));
    }

    #[test]
    fn test_percent_split_rejects_bad_total() {
        let result = compute_shares(
            SplitStrategy::Percent,
            dec!(90.00),
            &members(&["u1", "u2"]),
            &[percent("u1", dec!(50)), percent("u2", dec!(49))],
        );
        assert!(matches!(result, Err(AppError::PercentMismatch)));
    }

    #[test]
    fn test_weighted_split_proportions() {
        let shares = compute_shares(
            SplitStrategy::Shares,
            dec!(90.00),
            &members(&["u1", "u2"]),
            &[weighted("u1", dec!(1)), weighted("u2", dec!(2))],
        )
        .unwrap();

        assert_eq!(shares[0].amount, dec!(30.00));
        assert_eq!(shares[1].amount, dec!(60.00));
    }

    #[test]
    fn test_weighted_split_rejects_zero_total() {
        let result = compute_shares(
            SplitStrategy::Shares,
            dec!(90.00),
            &members(&["u1", "u2"]),
            &[weighted("u1", dec!(0)), weighted("u2", dec!(0))],
        );
        assert!(matches!(result, Err(AppError::InvalidSharesTotal)));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result = SplitStrategy::from_str("vibes");
        assert!(matches!(result, Err(AppError::InvalidSplit(_))));
    }

    #[test]
    fn test_balances_are_zero_sum() {
        let expenses = vec![
            expense("u1", dec!(90.00), &[
                ("u1", dec!(30.00)),
                ("u2", dec!(30.00)),
                ("u3", dec!(30.00)),
            ]),
            expense("u2", dec!(45.50), &[
                ("u1", dec!(20.00)),
                ("u3", dec!(25.50)),
            ]),
        ];

        let balances = aggregate_balances(&expenses);
        let total: Decimal = balances.values().copied().sum();
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn test_end_to_end_equal_split_balances() {
        // 三人群组，u1 垫付 90 平摊：u1 +60，其余每人 -30
        let shares = compute_shares(
            SplitStrategy::Equal,
            dec!(90.00),
            &members(&["u1", "u2", "u3"]),
            &[],
        )
        .unwrap();

        let e = expense(
            "u1",
            dec!(90.00),
            &shares
                .iter()
                .map(|s| (s.user_id.as_str(), s.amount))
                .collect::<Vec<_>>(),
        );

        let balances = aggregate_balances(&[e]);
        assert_eq!(balances["u1"], dec!(60.00));
        assert_eq!(balances["u2"], dec!(-30.00));
        assert_eq!(balances["u3"], dec!(-30.00));
    }

    #[test]
    fn test_settlement_shifts_balances() {
        let before = vec![expense("u1", dec!(40.00), &[("u2", dec!(40.00))])];
        let balances_before = aggregate_balances(&before);
        assert_eq!(balances_before["u1"], dec!(40.00));
        assert_eq!(balances_before["u2"], dec!(-40.00));

        // u2 结算 20 给 u1：u2 +20、u1 -20（相对结算前）
        let mut after = before;
        after.push(expense("u2", dec!(20.00), &[("u1", dec!(20.00))]));
        let balances_after = aggregate_balances(&after);
        assert_eq!(balances_after["u1"], dec!(20.00));
        assert_eq!(balances_after["u2"], dec!(-20.00));
    }

    #[test]
    fn test_csv_export_shape() {
        let mut balances = BTreeMap::new();
        balances.insert("u1".to_string(), dec!(60.00));
        balances.insert("u2".to_string(), dec!(-30.00));
        balances.insert("u3".to_string(), dec!(-30));

        let csv = balances_to_csv(&balances).unwrap();
        let lines: Vec<&str> = csv.trim_end().lines().collect();
        assert_eq!(lines[0], "userId,amount");
        assert_eq!(lines[1], "u1,60.00");
        assert_eq!(lines[2], "u2,-30.00");
        assert_eq!(lines[3], "u3,-30.00");
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec!(0)).is_err());
        assert!(validate_amount(dec!(-5.00)).is_err());
        assert!(validate_amount(dec!(10.999)).is_err());
        assert!(validate_amount(dec!(10.99)).is_ok());
    }

    proptest! {
        // 任意金额、任意成员数的平摊都必须精确到分对账
        #[test]
        fn prop_equal_split_reconciles(cents in 1u64..=10_000_000, member_count in 1usize..=24) {
            let amount = Decimal::new(cents as i64, 2);
            let member_ids: Vec<String> = (0..member_count).map(|i| format!("user_{:02}", i)).collect();

            let shares = compute_shares(SplitStrategy::Equal, amount, &member_ids, &[]).unwrap();
            let total: Decimal = shares.iter().map(|s| s.amount).sum();

            prop_assert_eq!(total, amount);
            prop_assert_eq!(shares.len(), member_count);
        }

        // 权重分摊同样必须对账
        #[test]
        fn prop_weighted_split_reconciles(
            cents in 1u64..=1_000_000,
            weights in proptest::collection::vec(1u32..=20, 1..=8),
        ) {
            let amount = Decimal::new(cents as i64, 2);
            let member_ids: Vec<String> = (0..weights.len()).map(|i| format!("user_{:02}", i)).collect();
            let raw: Vec<RawShare> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| RawShare {
                    user_id: format!("user_{:02}", i),
                    amount: None,
                    percent: None,
                    weight: Some(Decimal::from(*w)),
                })
                .collect();

            let shares = compute_shares(SplitStrategy::Shares, amount, &member_ids, &raw).unwrap();
            let total: Decimal = shares.iter().map(|s| s.amount).sum();

            prop_assert_eq!(total, amount);
        }
    }
}
