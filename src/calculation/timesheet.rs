//! The timesheet calculator.
//!
//! [`compute`] turns one day's punches, the calendar context and the approved
//! requests into a fully determined entry. It is a pure function of its
//! inputs: every derived field is reset and rebuilt on each call, so running
//! it again with unchanged inputs leaves the entry unchanged.
//!
//! Rules are evaluated in a fixed order, each gating the next:
//!
//! 1. Global exemption (never applied to a future date)
//! 2. Punch classification
//! 3. Precedence: attendance over leave over nothing; rest days cannot be
//!    consumed as leave
//! 4. Single punch override (absolute once finalizing)
//! 5. Scheduled hours and approved overtime
//! 6. Overtime bucket
//! 7. Late/early penalty
//! 8. Status
//! 9. Working-day credit plus post-parental bonus
//! 10. Holiday full credit
//! 11. Compensatory-day debt
//! 12. Leave credit on true absence

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{
    AbsentReason, ApprovedRequest, AttendanceStatus, AuditWarning, CalculationTrace, DayContext,
    DayType, OvertimeHours, TimesheetEntry,
};

use super::hours::calculate_hours;
use super::penalty::calculate_penalty;
use super::policy::CalculationPolicy;
use super::precedence::{ResolvedRequests, resolve_requests};
use super::punches::{PunchState, classify_punches};

/// Everything [`compute`] reads besides the entry itself.
#[derive(Debug, Clone)]
pub struct CalculationInput<'a> {
    /// Calendar context; `None` falls back to a regular day with no schedule.
    pub context: Option<&'a DayContext>,
    /// Approved requests overlapping the date.
    pub requests: &'a [ApprovedRequest],
    /// Whether the employee is exempt from attendance on the date.
    pub globally_exempt: bool,
    /// End-of-day mode.
    pub finalizing: bool,
    /// The current date, used to hold back exemptions on future dates.
    pub today: NaiveDate,
    /// Grace and bonus parameters.
    pub policy: &'a CalculationPolicy,
}

/// Recomputes every derived field of `entry`.
///
/// Never fails. Missing context and conflicting leave are reported as
/// warnings on the returned trace; conflicts also set `needs_review`.
///
/// # Example
///
/// ```
/// use timesheet_engine::calculation::{compute, CalculationInput, CalculationPolicy};
/// use timesheet_engine::models::{
///     AttendanceStatus, DayContext, DayType, PayTerms, ScheduledSegment, TimesheetEntry,
/// };
/// use chrono::{NaiveDate, NaiveTime};
/// use rust_decimal::Decimal;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let context = DayContext {
///     day_type: DayType::Regular,
///     segments: vec![
///         ScheduledSegment { start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(), end: NaiveTime::from_hms_opt(12, 0, 0).unwrap() },
///         ScheduledSegment { start: NaiveTime::from_hms_opt(13, 30, 0).unwrap(), end: NaiveTime::from_hms_opt(17, 30, 0).unwrap() },
///     ],
///     max_credit: Decimal::ONE,
///     pay_terms: PayTerms::default(),
/// };
/// let policy = CalculationPolicy::default();
///
/// let mut entry = TimesheetEntry::new("emp_001", date);
/// entry.start_time = date.and_hms_opt(8, 0, 0);
/// entry.end_time = date.and_hms_opt(17, 30, 0);
///
/// compute(&mut entry, &CalculationInput {
///     context: Some(&context),
///     requests: &[],
///     globally_exempt: false,
///     finalizing: true,
///     today: date.succ_opt().unwrap(),
///     policy: &policy,
/// });
///
/// assert_eq!(entry.status, Some(AttendanceStatus::OnTime));
/// assert_eq!(entry.working_days, Some(Decimal::ONE));
/// ```
pub fn compute(entry: &mut TimesheetEntry, input: &CalculationInput<'_>) -> CalculationTrace {
    let mut trace = CalculationTrace::default();

    let fallback;
    let context = match input.context {
        Some(context) => context,
        None => {
            trace.warn(AuditWarning::new(
                "MISSING_DAY_CONTEXT",
                format!(
                    "No calendar context for {} on {}; treated as a regular day with no schedule",
                    entry.employee_id, entry.date
                ),
                "low",
            ));
            fallback = DayContext::fallback();
            &fallback
        }
    };

    let resolved = resolve_requests(&entry.employee_id, entry.date, input.requests);
    let grace_minutes = if resolved.extends_grace() {
        input.policy.accommodation_grace_minutes
    } else {
        input.policy.default_grace_minutes
    };

    reset_derived(entry, context, input, grace_minutes);

    if !resolved.conflicting_leave_ids.is_empty() {
        entry.needs_review = true;
        trace.warn(AuditWarning::new(
            "CONFLICTING_LEAVE",
            format!(
                "Leave request {:?} chosen over conflicting requests {:?}",
                resolved.leave_request_id, resolved.conflicting_leave_ids
            ),
            "medium",
        ));
    }

    let punches = classify_punches(entry);
    if punches.reordered {
        trace.warn(AuditWarning::new(
            "PUNCHES_REORDERED",
            "Check-out was earlier than check-in; punches were swapped",
            "low",
        ));
    }
    trace.record(
        "classify_punches",
        "Classify Punches",
        serde_json::json!({
            "start_time": entry.start_time,
            "end_time": entry.end_time,
        }),
        serde_json::json!({ "punches": entry.punch_count() }),
        format!("{} punch(es) recorded", entry.punch_count()),
    );

    let is_single = matches!(punches.state, PunchState::Single { .. });

    if input.globally_exempt {
        if entry.date > input.today {
            trace.record(
                "global_exemption",
                "Global Exemption",
                serde_json::json!({ "date": entry.date, "today": input.today }),
                serde_json::json!({ "applied": false }),
                "Exemption is not applied ahead of the date",
            );
            log_result(entry, input);
            return trace;
        }
        if !(is_single && input.finalizing) {
            apply_exemption(entry, &mut trace);
            entry.is_finalized = input.finalizing;
            log_result(entry, input);
            return trace;
        }
    }

    match punches.state {
        PunchState::Single { at } => apply_single_punch(entry, at, input.finalizing, &mut trace),
        PunchState::Pair { start, end } => {
            apply_attendance(entry, start, end, context, &resolved, input, &mut trace);
            apply_holiday_override(entry, &mut trace);
        }
        PunchState::Missing => {
            apply_absence(entry, context, &resolved, input.finalizing, &mut trace);
            apply_holiday_override(entry, &mut trace);
        }
    }

    entry.is_finalized = input.finalizing;
    log_result(entry, input);
    trace
}

fn log_result(entry: &TimesheetEntry, input: &CalculationInput<'_>) {
    debug!(
        employee_id = %entry.employee_id,
        date = %entry.date,
        finalizing = input.finalizing,
        status = ?entry.status,
        working_days = ?entry.working_days,
        "Timesheet entry computed"
    );
}

/// Clears every derived field and copies the calendar snapshot.
fn reset_derived(
    entry: &mut TimesheetEntry,
    context: &DayContext,
    input: &CalculationInput<'_>,
    grace_minutes: i64,
) {
    entry.day_type = context.day_type;
    entry.max_credit = context.max_credit;
    entry.pay_terms = context.pay_terms.clone();
    entry.is_globally_exempt = input.globally_exempt;
    entry.grace_minutes = grace_minutes;
    entry.status = None;
    entry.working_days = None;
    entry.absent_reason = None;
    entry.late_minutes = 0;
    entry.early_minutes = 0;
    entry.is_penalized = false;
    entry.worked_hours = Decimal::ZERO;
    entry.overtime = OvertimeHours::default();
    entry.is_finalized = false;
    entry.needs_review = false;
}

fn apply_exemption(entry: &mut TimesheetEntry, trace: &mut CalculationTrace) {
    entry.status = Some(AttendanceStatus::OnTime);
    entry.working_days = Some(entry.max_credit);
    trace.record(
        "global_exemption",
        "Global Exemption",
        serde_json::json!({ "max_credit": entry.max_credit.to_string() }),
        serde_json::json!({ "applied": true, "working_days": entry.max_credit.to_string() }),
        "Employee is exempt from attendance; full credit with no penalties",
    );
}

fn apply_single_punch(
    entry: &mut TimesheetEntry,
    at: NaiveDateTime,
    finalizing: bool,
    trace: &mut CalculationTrace,
) {
    if finalizing {
        let half = entry.max_credit / Decimal::TWO;
        entry.status = Some(AttendanceStatus::SinglePunch);
        entry.working_days = Some(half);
        trace.record(
            "single_punch",
            "Single Punch Override",
            serde_json::json!({ "punch": at, "max_credit": entry.max_credit.to_string() }),
            serde_json::json!({ "status": "single_punch", "working_days": half.to_string() }),
            "Only one punch at end of day; half credit, overtime and penalties voided",
        );
    } else {
        entry.status = Some(AttendanceStatus::NotOnTime);
        trace.record(
            "single_punch",
            "Single Punch Override",
            serde_json::json!({ "punch": at }),
            serde_json::json!({ "status": "not_on_time", "working_days": null }),
            "Pair is still missing; day shown as incomplete until finalized",
        );
    }
}

fn apply_attendance(
    entry: &mut TimesheetEntry,
    start: NaiveDateTime,
    end: NaiveDateTime,
    context: &DayContext,
    resolved: &ResolvedRequests,
    input: &CalculationInput<'_>,
    trace: &mut CalculationTrace,
) {
    if let Some(reason) = resolved.leave {
        trace.record(
            "attendance_over_leave",
            "Attendance Overrides Leave",
            serde_json::json!({ "leave": reason, "request_id": resolved.leave_request_id }),
            serde_json::json!({ "absent_reason": null }),
            "Employee attended; approved leave is not consumed",
        );
    }

    let hours = calculate_hours(start, end, entry.date, context, &resolved.overtime_windows);
    entry.worked_hours = hours.worked_hours;
    entry.overtime = hours.overtime.clone();
    trace.record(
        "hours",
        "Scheduled Hours and Overtime",
        serde_json::json!({
            "start": start,
            "end": end,
            "overtime_windows": resolved.overtime_windows.len(),
        }),
        serde_json::json!({
            "worked_hours": hours.worked_hours.to_string(),
            "overtime_minutes": hours.overtime_minutes,
            "unapproved_minutes": hours.unapproved_minutes,
            "bucket": hours.bucket,
        }),
        format!(
            "{} scheduled minutes, {} approved overtime minutes, {} unapproved minutes discarded",
            hours.scheduled_minutes, hours.overtime_minutes, hours.unapproved_minutes
        ),
    );

    let penalty = calculate_penalty(start, end, entry.date, context, entry.grace_minutes);
    entry.late_minutes = penalty.late_minutes;
    entry.early_minutes = penalty.early_minutes;
    entry.is_penalized = penalty.is_penalized;
    entry.status = Some(if penalty.is_penalized {
        AttendanceStatus::NotOnTime
    } else {
        AttendanceStatus::OnTime
    });
    trace.record(
        "penalty",
        "Late and Early Penalty",
        serde_json::json!({
            "late_minutes": penalty.late_minutes,
            "early_minutes": penalty.early_minutes,
            "grace_minutes": penalty.grace_minutes,
        }),
        serde_json::json!({ "is_penalized": penalty.is_penalized }),
        format!(
            "{} late + {} early against {} minutes grace",
            penalty.late_minutes, penalty.early_minutes, penalty.grace_minutes
        ),
    );

    let mut credit = entry.max_credit;
    if resolved.post_parental && context.has_schedule() {
        credit += input.policy.accommodation_bonus_credit;
    }
    entry.working_days = Some(credit);
    trace.record(
        "working_day_credit",
        "Working-Day Credit",
        serde_json::json!({
            "max_credit": entry.max_credit.to_string(),
            "post_parental": resolved.post_parental,
        }),
        serde_json::json!({ "working_days": credit.to_string() }),
        "Both punches present; scheduled credit awarded",
    );
}

fn apply_absence(
    entry: &mut TimesheetEntry,
    context: &DayContext,
    resolved: &ResolvedRequests,
    finalizing: bool,
    trace: &mut CalculationTrace,
) {
    if !context.has_schedule() {
        entry.working_days = Some(Decimal::ZERO);
        trace.record(
            "rest_day",
            "Rest Day",
            serde_json::json!({ "leave": resolved.leave }),
            serde_json::json!({ "working_days": "0", "status": null }),
            "Nothing scheduled; the day cannot be consumed as leave",
        );
        return;
    }

    if let Some(reason) = resolved.leave {
        entry.absent_reason = Some(reason);
        if finalizing {
            let credit = match reason {
                AbsentReason::PaidLeave => entry.max_credit,
                AbsentReason::UnpaidLeave | AbsentReason::MaternityLeave => Decimal::ZERO,
            };
            entry.status = Some(AttendanceStatus::Absent);
            entry.working_days = Some(credit);
        }
        trace.record(
            "leave_credit",
            "Leave Credit",
            serde_json::json!({ "leave": reason, "request_id": resolved.leave_request_id }),
            serde_json::json!({
                "status": entry.status,
                "working_days": entry.working_days.map(|d| d.to_string()),
            }),
            if finalizing {
                "Absent on approved leave"
            } else {
                "Approved leave recorded; absence confirmed at end of day"
            },
        );
        return;
    }

    if !finalizing || entry.day_type == DayType::Holiday {
        return;
    }

    entry.status = Some(AttendanceStatus::Absent);
    if entry.day_type == DayType::Compensatory {
        let debt = -entry.max_credit;
        entry.working_days = Some(debt);
        trace.record(
            "compensatory_debt",
            "Compensatory-Day Debt",
            serde_json::json!({ "max_credit": entry.max_credit.to_string() }),
            serde_json::json!({ "status": "absent", "working_days": debt.to_string() }),
            "Missed makeup shift is owed",
        );
    } else {
        entry.working_days = Some(Decimal::ZERO);
        trace.record(
            "absence",
            "Unexcused Absence",
            serde_json::json!({}),
            serde_json::json!({ "status": "absent", "working_days": "0" }),
            "No attendance and no approved leave",
        );
    }
}

fn apply_holiday_override(entry: &mut TimesheetEntry, trace: &mut CalculationTrace) {
    if entry.day_type != DayType::Holiday {
        return;
    }
    entry.working_days = Some(entry.max_credit);
    trace.record(
        "holiday_override",
        "Holiday Full Credit",
        serde_json::json!({ "max_credit": entry.max_credit.to_string() }),
        serde_json::json!({ "working_days": entry.max_credit.to_string() }),
        "Holidays are always paid at full credit",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayTerms, RequestType, ScheduledSegment, TimeWindow};
    use chrono::NaiveTime;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date() -> NaiveDate {
        // Monday
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        date().succ_opt().unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn segment(sh: u32, sm: u32, eh: u32, em: u32) -> ScheduledSegment {
        ScheduledSegment {
            start: NaiveTime::from_hms_opt(sh, sm, 0).unwrap(),
            end: NaiveTime::from_hms_opt(eh, em, 0).unwrap(),
        }
    }

    fn context(day_type: DayType) -> DayContext {
        DayContext {
            day_type,
            segments: vec![segment(8, 0, 12, 0), segment(13, 30, 17, 30)],
            max_credit: Decimal::ONE,
            pay_terms: PayTerms {
                wage_rate: dec("250000"),
                net_pay_percent: dec("100"),
                is_full_salary_day: true,
            },
        }
    }

    fn rest_day() -> DayContext {
        DayContext {
            day_type: DayType::Regular,
            segments: vec![],
            max_credit: Decimal::ZERO,
            pay_terms: PayTerms::default(),
        }
    }

    fn holiday() -> DayContext {
        DayContext {
            day_type: DayType::Holiday,
            segments: vec![],
            max_credit: Decimal::ONE,
            pay_terms: PayTerms::default(),
        }
    }

    fn request(id: u64, request_type: RequestType) -> ApprovedRequest {
        ApprovedRequest {
            id,
            employee_id: "emp_001".to_string(),
            request_type,
            start_date: date(),
            end_date: date(),
            window: None,
            approved_at: NaiveDate::from_ymd_opt(2026, 2, 20)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    fn entry(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> TimesheetEntry {
        let mut entry = TimesheetEntry::new("emp_001", date());
        entry.start_time = start;
        entry.end_time = end;
        entry
    }

    struct Run<'a> {
        context: Option<&'a DayContext>,
        requests: &'a [ApprovedRequest],
        exempt: bool,
        finalizing: bool,
        today: NaiveDate,
    }

    impl<'a> Run<'a> {
        fn finalize(context: &'a DayContext) -> Self {
            Self {
                context: Some(context),
                requests: &[],
                exempt: false,
                finalizing: true,
                today: tomorrow(),
            }
        }

        fn in_progress(context: &'a DayContext) -> Self {
            Self {
                finalizing: false,
                today: date(),
                ..Self::finalize(context)
            }
        }

        fn with_requests(mut self, requests: &'a [ApprovedRequest]) -> Self {
            self.requests = requests;
            self
        }

        fn exempt(mut self) -> Self {
            self.exempt = true;
            self
        }

        fn apply(&self, entry: &mut TimesheetEntry) -> CalculationTrace {
            let policy = CalculationPolicy::default();
            compute(
                entry,
                &CalculationInput {
                    context: self.context,
                    requests: self.requests,
                    globally_exempt: self.exempt,
                    finalizing: self.finalizing,
                    today: self.today,
                    policy: &policy,
                },
            )
        }
    }

    // ==========================================================================
    // Scenario 1: two punches on a regular two-shift weekday
    // ==========================================================================
    #[test]
    fn test_full_day_on_time() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(8, 0)), Some(at(17, 30)));
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
        assert_eq!(e.working_days, Some(dec("1.00")));
        assert_eq!(e.late_minutes, 0);
        assert_eq!(e.early_minutes, 0);
        assert_eq!(e.worked_hours, dec("8"));
        assert_eq!(e.grace_minutes, 5);
        assert!(e.is_finalized);
        assert_eq!(e.pay_terms.wage_rate, dec("250000"));
    }

    // ==========================================================================
    // Scenario 2: single punch finalizes to half credit
    // ==========================================================================
    #[test]
    fn test_single_punch_finalized() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(8, 0)), None);
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::SinglePunch));
        assert_eq!(e.working_days, Some(dec("0.50")));
        assert!(!e.is_penalized);
        assert_eq!(e.overtime.total(), Decimal::ZERO);
    }

    #[test]
    fn test_single_punch_in_progress_is_incomplete() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(8, 0)), None);
        Run::in_progress(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::NotOnTime));
        assert_eq!(e.working_days, None);
        assert!(!e.is_finalized);
    }

    #[test]
    fn test_single_punch_beats_leave_exemption_and_accommodation() {
        let ctx = context(DayType::Regular);
        let requests = [
            request(1, RequestType::LeavePaid),
            request(2, RequestType::PostParental),
        ];
        let mut e = entry(None, Some(at(17, 30)));
        let trace = Run::finalize(&ctx)
            .with_requests(&requests)
            .exempt()
            .apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::SinglePunch));
        assert_eq!(e.working_days, Some(dec("0.5")));
        assert_eq!(e.absent_reason, None);
        assert!(trace.has_rule("single_punch"));
    }

    #[test]
    fn test_single_punch_on_holiday_still_half_credit() {
        let ctx = holiday();
        let mut e = entry(Some(at(9, 0)), None);
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::SinglePunch));
        assert_eq!(e.working_days, Some(dec("0.5")));
    }

    // ==========================================================================
    // Scenario 3: paid leave, no punches
    // ==========================================================================
    #[test]
    fn test_paid_leave_finalized() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(None, None);
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::Absent));
        assert_eq!(e.absent_reason, Some(AbsentReason::PaidLeave));
        assert_eq!(e.working_days, Some(dec("1.00")));
    }

    #[test]
    fn test_leave_in_progress_leaves_status_open() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(None, None);
        Run::in_progress(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.status, None);
        assert_eq!(e.working_days, None);
        assert_eq!(e.absent_reason, Some(AbsentReason::PaidLeave));
    }

    #[test]
    fn test_unpaid_and_maternity_leave_earn_nothing() {
        let ctx = context(DayType::Regular);
        for request_type in [RequestType::LeaveUnpaid, RequestType::LeaveMaternity] {
            let requests = [request(1, request_type)];
            let mut e = entry(None, None);
            Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

            assert_eq!(e.status, Some(AttendanceStatus::Absent));
            assert_eq!(e.working_days, Some(Decimal::ZERO));
            assert_eq!(e.absent_reason, request_type.leave_reason());
        }
    }

    // ==========================================================================
    // Scenario 4: leave on a rest day
    // ==========================================================================
    #[test]
    fn test_leave_on_rest_day_is_not_consumed() {
        let ctx = rest_day();
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(None, None);
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.working_days, Some(Decimal::ZERO));
        assert_eq!(e.status, None);
        assert_eq!(e.absent_reason, None);
        assert!(e.is_finalized);
    }

    // ==========================================================================
    // Scenario 5: attendance overrides leave
    // ==========================================================================
    #[test]
    fn test_attendance_overrides_leave() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(Some(at(8, 0)), Some(at(17, 30)));
        e.absent_reason = Some(AbsentReason::PaidLeave);
        let trace = Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
        assert_eq!(e.absent_reason, None);
        assert_eq!(e.working_days, Some(dec("1.00")));
        assert!(trace.has_rule("attendance_over_leave"));
    }

    // ==========================================================================
    // Scenario 6: compensatory day with no attendance
    // ==========================================================================
    #[test]
    fn test_compensatory_absence_is_debt() {
        let ctx = context(DayType::Compensatory);
        let mut e = entry(None, None);
        let trace = Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::Absent));
        assert_eq!(e.working_days, Some(dec("-1.00")));
        assert!(trace.has_rule("compensatory_debt"));
    }

    #[test]
    fn test_compensatory_with_paid_leave_uses_leave_credit() {
        let ctx = context(DayType::Compensatory);
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(None, None);
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.working_days, Some(Decimal::ONE));
        assert_eq!(e.absent_reason, Some(AbsentReason::PaidLeave));
    }

    #[test]
    fn test_compensatory_in_progress_has_no_debt_yet() {
        let ctx = context(DayType::Compensatory);
        let mut e = entry(None, None);
        Run::in_progress(&ctx).apply(&mut e);

        assert_eq!(e.status, None);
        assert_eq!(e.working_days, None);
    }

    #[test]
    fn test_unexcused_absence_on_regular_day() {
        let ctx = context(DayType::Regular);
        let mut e = entry(None, None);
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::Absent));
        assert_eq!(e.working_days, Some(Decimal::ZERO));
        assert_eq!(e.absent_reason, None);
    }

    // ==========================================================================
    // Holiday override
    // ==========================================================================
    #[test]
    fn test_holiday_without_attendance_gets_full_credit() {
        let ctx = holiday();
        let mut e = entry(None, None);
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.working_days, Some(Decimal::ONE));
        assert_eq!(e.status, None);
    }

    #[test]
    fn test_holiday_with_attendance_keeps_status_and_full_credit() {
        let ctx = holiday();
        let mut overtime = request(3, RequestType::Overtime);
        overtime.window = Some(TimeWindow {
            start: at(8, 0),
            end: at(12, 0),
        });
        let requests = [overtime];
        let mut e = entry(Some(at(8, 0)), Some(at(12, 0)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
        assert_eq!(e.working_days, Some(Decimal::ONE));
        assert_eq!(e.overtime.holiday, dec("4"));
    }

    #[test]
    fn test_holiday_in_progress_also_full_credit() {
        let ctx = holiday();
        let mut e = entry(None, None);
        Run::in_progress(&ctx).apply(&mut e);

        assert_eq!(e.working_days, Some(Decimal::ONE));
    }

    // ==========================================================================
    // Penalties and accommodation
    // ==========================================================================
    #[test]
    fn test_late_beyond_grace_is_not_on_time_with_full_credit() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(8, 20)), Some(at(17, 30)));
        Run::finalize(&ctx).apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::NotOnTime));
        assert_eq!(e.late_minutes, 20);
        assert!(e.is_penalized);
        assert_eq!(e.working_days, Some(Decimal::ONE));
    }

    #[test]
    fn test_grace_boundary() {
        let ctx = context(DayType::Regular);

        let mut e = entry(Some(at(8, 5)), Some(at(17, 30)));
        Run::finalize(&ctx).apply(&mut e);
        assert!(!e.is_penalized);
        assert_eq!(e.status, Some(AttendanceStatus::OnTime));

        let mut e = entry(Some(at(8, 6)), Some(at(17, 30)));
        Run::finalize(&ctx).apply(&mut e);
        assert!(e.is_penalized);
        assert_eq!(e.status, Some(AttendanceStatus::NotOnTime));
    }

    #[test]
    fn test_late_exemption_extends_grace() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::LateExemption)];
        let mut e = entry(Some(at(9, 0)), Some(at(17, 30)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.grace_minutes, 65);
        assert!(!e.is_penalized);
        assert_eq!(e.working_days, Some(Decimal::ONE));
    }

    #[test]
    fn test_post_parental_bonus_independent_of_penalty() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::PostParental)];

        let mut e = entry(Some(at(8, 0)), Some(at(16, 30)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);
        assert!(!e.is_penalized);
        assert_eq!(e.working_days, Some(dec("1.125")));

        let mut e = entry(Some(at(10, 0)), Some(at(17, 30)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);
        assert!(e.is_penalized);
        assert_eq!(e.working_days, Some(dec("1.125")));
    }

    #[test]
    fn test_weekday_overtime_within_window() {
        let ctx = context(DayType::Regular);
        let mut overtime = request(1, RequestType::Overtime);
        overtime.window = Some(TimeWindow {
            start: at(17, 30),
            end: at(19, 30),
        });
        let requests = [overtime];
        let mut e = entry(Some(at(8, 0)), Some(at(19, 0)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.overtime.weekday, dec("1.5"));
        assert_eq!(e.overtime.weekend, Decimal::ZERO);
    }

    #[test]
    fn test_rest_day_attendance_goes_to_weekend_overtime() {
        let ctx = rest_day();
        let mut overtime = request(1, RequestType::Overtime);
        overtime.window = Some(TimeWindow {
            start: at(8, 0),
            end: at(12, 0),
        });
        let requests = [overtime];
        let mut e = entry(Some(at(8, 0)), Some(at(12, 0)));
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e.overtime.weekend, dec("4"));
        assert_eq!(e.working_days, Some(Decimal::ZERO));
        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
    }

    // ==========================================================================
    // Global exemption
    // ==========================================================================
    #[test]
    fn test_exemption_gives_full_credit() {
        let ctx = context(DayType::Regular);
        let mut e = entry(None, None);
        Run::finalize(&ctx).exempt().apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
        assert_eq!(e.working_days, Some(Decimal::ONE));
        assert!(e.is_globally_exempt);
        assert!(!e.is_penalized);
    }

    #[test]
    fn test_exemption_clears_penalty() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(10, 0)), Some(at(15, 0)));
        Run::finalize(&ctx).exempt().apply(&mut e);

        assert_eq!(e.late_minutes, 0);
        assert_eq!(e.early_minutes, 0);
        assert!(!e.is_penalized);
    }

    #[test]
    fn test_exemption_not_applied_to_future_date() {
        let ctx = context(DayType::Regular);
        let mut e = entry(None, None);
        let mut run = Run::in_progress(&ctx).exempt();
        run.today = date().pred_opt().unwrap();
        let trace = run.apply(&mut e);

        assert_eq!(e.status, None);
        assert_eq!(e.working_days, None);
        assert!(e.is_globally_exempt);
        assert!(trace.has_rule("global_exemption"));
    }

    #[test]
    fn test_exemption_applies_today_in_progress() {
        let ctx = context(DayType::Regular);
        let mut e = entry(None, None);
        Run::in_progress(&ctx).exempt().apply(&mut e);

        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
        assert_eq!(e.working_days, Some(Decimal::ONE));
    }

    // ==========================================================================
    // Defaults, conflicts and idempotence
    // ==========================================================================
    #[test]
    fn test_missing_context_falls_back() {
        let mut e = entry(Some(at(8, 0)), Some(at(17, 0)));
        let run = Run {
            context: None,
            requests: &[],
            exempt: false,
            finalizing: true,
            today: tomorrow(),
        };
        let trace = run.apply(&mut e);

        assert!(trace.has_warning("MISSING_DAY_CONTEXT"));
        assert_eq!(e.day_type, DayType::Regular);
        assert_eq!(e.grace_minutes, 5);
        assert_eq!(e.working_days, Some(Decimal::ZERO));
    }

    #[test]
    fn test_conflicting_leave_flags_review() {
        let ctx = context(DayType::Regular);
        let mut unpaid = request(2, RequestType::LeaveUnpaid);
        unpaid.approved_at = unpaid.approved_at + chrono::Duration::days(1);
        let requests = [request(1, RequestType::LeavePaid), unpaid];
        let mut e = entry(None, None);
        let trace = Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert!(trace.has_warning("CONFLICTING_LEAVE"));
        assert!(e.needs_review);
        assert_eq!(e.absent_reason, Some(AbsentReason::UnpaidLeave));
    }

    #[test]
    fn test_reversed_punches_are_handled() {
        let ctx = context(DayType::Regular);
        let mut e = entry(Some(at(17, 30)), Some(at(8, 0)));
        let trace = Run::finalize(&ctx).apply(&mut e);

        assert!(trace.has_warning("PUNCHES_REORDERED"));
        assert_eq!(e.status, Some(AttendanceStatus::OnTime));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::PostParental)];
        let mut e = entry(Some(at(8, 40)), Some(at(17, 0)));

        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);
        let first = e.clone();
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);

        assert_eq!(e, first);
    }

    #[test]
    fn test_refinalizing_after_leave_revocation_resets_reason() {
        let ctx = context(DayType::Regular);
        let requests = [request(1, RequestType::LeavePaid)];
        let mut e = entry(None, None);
        Run::finalize(&ctx).with_requests(&requests).apply(&mut e);
        assert_eq!(e.absent_reason, Some(AbsentReason::PaidLeave));

        Run::finalize(&ctx).apply(&mut e);
        assert_eq!(e.absent_reason, None);
        assert_eq!(e.working_days, Some(Decimal::ZERO));
    }
}
