// src/allocation.rs
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AllocationError, ParseSettingError};
use crate::model::{Assignment, EmployeeId, PayrollRecord};
use crate::period::Period;

/// Decimal places kept on every share except the one that absorbs the remainder.
pub const SHARE_SCALE: u32 = 2;

/// Rule used to split one payroll amount across concurrent assignments. Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Pro-rate by reported hours; equal split when no hours were reported at all.
    #[default]
    ProrateByHours,
    EqualSplit,
    /// Whole amount to the first assignment in project-id order.
    FirstOnly,
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocationMode::ProrateByHours => "prorate_by_hours",
            AllocationMode::EqualSplit => "equal_split",
            AllocationMode::FirstOnly => "first_only",
        })
    }
}

impl FromStr for AllocationMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prorate_by_hours" | "split_by_hours" => Ok(AllocationMode::ProrateByHours),
            "equal_split" | "split_equal" => Ok(AllocationMode::EqualSplit),
            "first_only" => Ok(AllocationMode::FirstOnly),
            _ => Err(ParseSettingError::new("allocation mode", s)),
        }
    }
}

// --- Grouping ---

/// Everything known about one employee in one period: the unit of allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeMonth {
    pub employee_id: EmployeeId,
    pub period: Period,
    /// Sorted by project id; this order decides who absorbs rounding remainders.
    pub assignments: Vec<Assignment>,
    pub payroll: Option<PayrollRecord>,
}

/// Groups assignments and payroll by (employee, period). Iteration order is deterministic.
pub fn group_by_employee_month(
    assignments: &[Assignment],
    payroll: &[PayrollRecord],
) -> Vec<EmployeeMonth> {
    let mut groups: BTreeMap<(EmployeeId, Period), EmployeeMonth> = BTreeMap::new();

    for assignment in assignments {
        groups
            .entry((assignment.employee_id.clone(), assignment.period))
            .or_insert_with(|| EmployeeMonth {
                employee_id: assignment.employee_id.clone(),
                period: assignment.period,
                assignments: Vec::new(),
                payroll: None,
            })
            .assignments
            .push(assignment.clone());
    }
    for record in payroll {
        groups
            .entry((record.employee_id.clone(), record.period))
            .or_insert_with(|| EmployeeMonth {
                employee_id: record.employee_id.clone(),
                period: record.period,
                assignments: Vec::new(),
                payroll: None,
            })
            .payroll = Some(record.clone());
    }

    groups
        .into_values()
        .map(|mut group| {
            group
                .assignments
                .sort_by(|a, b| a.project_id.cmp(&b.project_id));
            group
        })
        .collect()
}

// --- Splitting ---

fn equal_weights(n: usize) -> Vec<Decimal> {
    vec![Decimal::ONE; n]
}

fn checked_sum(values: &[Decimal], operation: &'static str) -> Result<Decimal, AllocationError> {
    values.iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(*v).ok_or(AllocationError::Overflow { operation })
    })
}

/// Relative weight of each row under `mode`. Weights need not sum to one.
pub fn allocation_weights(hours: &[Decimal], mode: AllocationMode) -> Result<Vec<Decimal>, AllocationError> {
    Ok(match mode {
        AllocationMode::EqualSplit => equal_weights(hours.len()),
        AllocationMode::FirstOnly => (0..hours.len())
            .map(|i| if i == 0 { Decimal::ONE } else { Decimal::ZERO })
            .collect(),
        AllocationMode::ProrateByHours => {
            if checked_sum(hours, "hours total")?.is_zero() {
                equal_weights(hours.len())
            } else {
                hours.to_vec()
            }
        }
    })
}

/// Splits `total` in proportion to `weights`.
///
/// Every share but one is truncated to [`SHARE_SCALE`] places; the last row with a
/// non-zero weight receives `total` minus the others, so the shares always sum to
/// `total` exactly and no share goes negative. Zero-weight rows receive exactly zero.
pub fn split_amount(total: Decimal, weights: &[Decimal]) -> Result<Vec<Decimal>, AllocationError> {
    if weights.is_empty() {
        return Ok(Vec::new());
    }
    let weight_sum = checked_sum(weights, "weight total")?;
    if weight_sum.is_zero() {
        // Callers never pass all-zero weights; keep the money on the last row regardless.
        let mut shares = vec![Decimal::ZERO; weights.len()];
        if let Some(last) = shares.last_mut() {
            *last = total;
        }
        return Ok(shares);
    }

    let remainder_idx = weights
        .iter()
        .rposition(|w| !w.is_zero())
        .unwrap_or(weights.len() - 1);

    let mut shares = weights
        .iter()
        .map(|w| {
            if w.is_zero() {
                return Ok(Decimal::ZERO);
            }
            total
                .checked_mul(*w)
                .and_then(|scaled| scaled.checked_div(weight_sum))
                .map(|share| share.round_dp_with_strategy(SHARE_SCALE, RoundingStrategy::ToZero))
                .ok_or(AllocationError::Overflow { operation: "share" })
        })
        .collect::<Result<Vec<Decimal>, AllocationError>>()?;

    let others: Vec<Decimal> = shares
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != remainder_idx)
        .map(|(_, s)| *s)
        .collect();
    shares[remainder_idx] = total
        .checked_sub(checked_sum(&others, "share total")?)
        .ok_or(AllocationError::Overflow { operation: "remainder" })?;
    Ok(shares)
}

// --- Group allocation ---

#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedRow {
    /// `None` for the payroll-without-assignment row.
    pub assignment: Option<Assignment>,
    pub amount: Option<Decimal>,
    pub contribution: Option<Decimal>,
}

fn validate_group(group: &EmployeeMonth) -> Result<(), AllocationError> {
    if let Some(payroll) = &group.payroll {
        if payroll.gross_amount.is_sign_negative() && !payroll.gross_amount.is_zero() {
            return Err(AllocationError::NegativeGrossAmount {
                amount: payroll.gross_amount,
            });
        }
        if let Some(contribution) = payroll.employer_contribution {
            if contribution.is_sign_negative() && !contribution.is_zero() {
                return Err(AllocationError::NegativeContribution { amount: contribution });
            }
        }
    }
    for assignment in &group.assignments {
        if assignment.hours.is_sign_negative() && !assignment.hours.is_zero() {
            return Err(AllocationError::NegativeHours {
                project_id: assignment.project_id.clone(),
                hours: assignment.hours,
            });
        }
    }
    Ok(())
}

/// Apportions the group's payroll across its assignments.
///
/// - no assignments: one row with no project carrying the full amount;
/// - assignments but no payroll: one row per assignment with no amount;
/// - otherwise one row per assignment, shares from [`allocation_weights`] and [`split_amount`].
pub fn allocate_group(
    group: &EmployeeMonth,
    mode: AllocationMode,
) -> Result<Vec<AllocatedRow>, AllocationError> {
    validate_group(group)?;

    let Some(payroll) = &group.payroll else {
        return Ok(group
            .assignments
            .iter()
            .map(|a| AllocatedRow {
                assignment: Some(a.clone()),
                amount: None,
                contribution: None,
            })
            .collect());
    };

    if group.assignments.is_empty() {
        return Ok(vec![AllocatedRow {
            assignment: None,
            amount: Some(payroll.gross_amount),
            contribution: payroll.employer_contribution,
        }]);
    }

    let hours: Vec<Decimal> = group.assignments.iter().map(|a| a.hours).collect();
    let weights = allocation_weights(&hours, mode)?;
    let amounts = split_amount(payroll.gross_amount, &weights)?;
    let contributions = payroll
        .employer_contribution
        .map(|c| split_amount(c, &weights))
        .transpose()?;

    debug!(
        "Allocated {} for {}/{} across {} assignment(s): {:?}",
        payroll.gross_amount,
        group.employee_id,
        group.period,
        group.assignments.len(),
        amounts
    );

    Ok(group
        .assignments
        .iter()
        .enumerate()
        .map(|(i, a)| AllocatedRow {
            assignment: Some(a.clone()),
            amount: Some(amounts[i]),
            contribution: contributions.as_ref().map(|c| c[i]),
        })
        .collect())
}
