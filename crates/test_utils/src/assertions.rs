//! Custom Test Assertions
//!
//! Schedule invariant checks with messages that point at the offending row.

use domain_billing::{AmortizationPlan, Loan, ScheduleEntry};

/// Asserts that a persisted schedule is the complete schedule of `loan`
///
/// # Panics
///
/// Panics if the entry count, sequence numbering, amounts or due-date
/// spacing disagree with the loan.
pub fn assert_schedule_covers_loan(loan: &Loan, entries: &[ScheduleEntry]) {
    assert_eq!(
        entries.len(),
        loan.total_weeks as usize,
        "expected {} schedule rows for {}, found {}",
        loan.total_weeks,
        loan.id,
        entries.len()
    );

    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.loan_id, loan.id, "row {} belongs to another loan", index);
        assert_eq!(entry.sequence as usize, index + 1, "sequence gap at row {}", index);
        assert_eq!(
            entry.amount, loan.weekly_payment_amount,
            "week {} carries {} instead of the installment {}",
            entry.sequence, entry.amount, loan.weekly_payment_amount
        );
        let expected_due = loan.start_date + chrono::Days::new(7 * u64::from(entry.sequence));
        assert_eq!(entry.due_date, expected_due, "week {} is due on the wrong date", entry.sequence);
    }

    let total: i64 = entries.iter().map(|e| e.amount).sum();
    assert_eq!(total, loan.total_payable_amount, "schedule does not sum to the total payable");
}

/// Asserts the arithmetic invariants of a plan
pub fn assert_plan_is_exact(plan: &AmortizationPlan) {
    assert_eq!(
        plan.total_payable,
        plan.terms.principal_amount + plan.total_interest,
        "total payable must be principal plus interest"
    );
    assert_eq!(
        plan.weekly_payment * i64::from(plan.terms.total_weeks),
        plan.total_payable,
        "installments must cover the total payable exactly"
    );
    assert_eq!(plan.installments.len(), plan.terms.total_weeks as usize);
    for pair in plan.installments.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence + 1);
        assert_eq!((pair[1].due_date - pair[0].due_date).num_days(), 7);
    }
}
