//! The recalculation service.
//!
//! [`Recalculator`] is the only place entries are written. It reads the
//! external sources, runs [`compute`] against the stored entry, and rolls up
//! the affected months. Dates before today are finalized; today and later
//! dates are computed in progress. Entries are only created for dates on
//! which the employee is active.

use chrono::{Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::calculation::{CalculationInput, CalculationPolicy, LeaveBalance, compute, roll_up_month};
use crate::config::{ConfigLoader, LeavePolicy};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ApprovedRequest, CalculationTrace, DayContext, EntryKey, MonthKey, MonthlyTimesheet,
    TimesheetEntry,
};
use crate::sources::{CalendarSource, EmployeeDirectory, ExemptionSource, RequestSource};
use crate::store::TimesheetStore;

use super::trigger::RecalcTrigger;

/// The external collaborators the engine reads.
#[derive(Clone)]
pub struct Sources {
    /// Calendar context.
    pub calendar: Arc<dyn CalendarSource>,
    /// Approved requests.
    pub requests: Arc<dyn RequestSource>,
    /// Attendance exemptions.
    pub exemptions: Arc<dyn ExemptionSource>,
    /// Employee directory.
    pub directory: Arc<dyn EmployeeDirectory>,
}

/// An (employee, month) pair whose aggregate must be rolled up.
pub type MonthRef = (String, MonthKey);

/// What applying a trigger did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcOutcome {
    /// Entries recomputed.
    pub recalculated: usize,
    /// Months whose aggregates are now stale.
    pub touched_months: BTreeSet<MonthRef>,
}

/// Result of an end-of-day finalize pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    /// The date finalized.
    pub date: NaiveDate,
    /// Active employees on the date.
    pub employees: usize,
    /// Entries finalized.
    pub finalized: usize,
    /// Entries that did not exist and were created by the pass.
    pub created: usize,
    /// Employees whose entry could not be finalized.
    pub failed: Vec<String>,
    /// Monthly aggregates rolled up.
    pub months_rolled_up: usize,
}

/// Source data for one employee's date, read before the entry is locked.
struct DayInputs {
    context: Option<DayContext>,
    requests: Vec<ApprovedRequest>,
    globally_exempt: bool,
}

/// Recomputes entries and monthly aggregates.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use timesheet_engine::calculation::CalculationPolicy;
/// use timesheet_engine::config::LeavePolicy;
/// use timesheet_engine::recalc::{Recalculator, Sources};
/// use timesheet_engine::sources::{InMemoryDirectory, InMemoryExemptions, InMemoryRequests};
/// use timesheet_engine::store::InMemoryTimesheetStore;
/// # use timesheet_engine::sources::CalendarSource;
/// # use timesheet_engine::models::DayContext;
/// # struct NoCalendar;
/// # impl CalendarSource for NoCalendar {
/// #     fn day_context(&self, _: &str, _: chrono::NaiveDate) -> Option<DayContext> { None }
/// # }
/// use chrono::NaiveDate;
///
/// let sources = Sources {
///     calendar: Arc::new(NoCalendar),
///     requests: Arc::new(InMemoryRequests::new()),
///     exemptions: Arc::new(InMemoryExemptions::new()),
///     directory: Arc::new(InMemoryDirectory::default()),
/// };
/// let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
/// let recalculator = Recalculator::new(
///     Arc::new(InMemoryTimesheetStore::new()),
///     sources,
///     CalculationPolicy::default(),
///     LeavePolicy::default(),
/// )
/// .with_fixed_today(today);
///
/// let entry = recalculator
///     .record_punch("emp_001", today.and_hms_opt(8, 0, 0).unwrap())
///     .unwrap();
/// assert_eq!(entry.punch_count(), 1);
/// assert!(!entry.is_finalized);
/// ```
pub struct Recalculator {
    store: Arc<dyn TimesheetStore>,
    sources: Sources,
    policy: CalculationPolicy,
    leave: LeavePolicy,
    fixed_today: Option<NaiveDate>,
    worker_count: usize,
}

impl Recalculator {
    /// Creates a recalculator over a store and the external sources.
    pub fn new(
        store: Arc<dyn TimesheetStore>,
        sources: Sources,
        policy: CalculationPolicy,
        leave: LeavePolicy,
    ) -> Self {
        Self {
            store,
            sources,
            policy,
            leave,
            fixed_today: None,
            worker_count: 4,
        }
    }

    /// Creates a recalculator using the policies from configuration.
    pub fn from_config(
        loader: &ConfigLoader,
        store: Arc<dyn TimesheetStore>,
        sources: Sources,
    ) -> Self {
        Self::new(store, sources, loader.policy().clone(), loader.leave().clone())
            .with_worker_count(loader.recalc().worker_count)
    }

    /// Pins "today" instead of reading the local clock.
    pub fn with_fixed_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    /// Sets how many chunks the finalize pass runs concurrently.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// The current local date.
    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// The store entries are written to.
    pub fn store(&self) -> &Arc<dyn TimesheetStore> {
        &self.store
    }

    /// The external sources.
    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    fn day_inputs(&self, employee_id: &str, date: NaiveDate) -> DayInputs {
        DayInputs {
            context: self.sources.calendar.day_context(employee_id, date),
            requests: self.sources.requests.overlapping_requests(employee_id, date),
            globally_exempt: self.sources.exemptions.is_globally_exempt(employee_id, date),
        }
    }

    fn compute_with(
        &self,
        entry: &mut TimesheetEntry,
        inputs: &DayInputs,
        finalizing: bool,
        today: NaiveDate,
    ) -> CalculationTrace {
        let trace = compute(
            entry,
            &CalculationInput {
                context: inputs.context.as_ref(),
                requests: &inputs.requests,
                globally_exempt: inputs.globally_exempt,
                finalizing,
                today,
                policy: &self.policy,
            },
        );
        for warning in &trace.warnings {
            warn!(
                employee_id = %entry.employee_id,
                date = %entry.date,
                code = %warning.code,
                "{}",
                warning.message
            );
        }
        trace
    }

    /// Runs the calculator on an entry with the current inputs.
    pub fn compute_entry(
        &self,
        entry: &mut TimesheetEntry,
        finalizing: bool,
        today: NaiveDate,
    ) -> CalculationTrace {
        let inputs = self.day_inputs(&entry.employee_id, entry.date);
        self.compute_with(entry, &inputs, finalizing, today)
    }

    /// Records a punch and recomputes the entry.
    ///
    /// Punches dated in the future are rejected. A late punch for a past date
    /// refinalizes that entry and rolls up its month.
    pub fn record_punch(&self, employee_id: &str, at: NaiveDateTime) -> EngineResult<TimesheetEntry> {
        if employee_id.trim().is_empty() {
            return Err(EngineError::InvalidPunch {
                employee_id: employee_id.to_string(),
                message: "employee id is empty".to_string(),
            });
        }
        let today = self.today();
        let date = at.date();
        if date > today {
            return Err(EngineError::InvalidPunch {
                employee_id: employee_id.to_string(),
                message: format!("punch at {} is dated after today ({})", at, today),
            });
        }

        let finalizing = date < today;
        let key = EntryKey::new(employee_id, date);
        let inputs = self.day_inputs(employee_id, date);
        let entry = self.store.upsert_with(&key, &mut |entry| {
            entry.record_punch(at);
            self.compute_with(entry, &inputs, finalizing, today);
        })?;

        info!(
            employee_id = %employee_id,
            date = %date,
            punches = entry.punch_count(),
            status = ?entry.status,
            "Punch recorded"
        );

        if finalizing {
            self.rollup_month(employee_id, MonthKey::of(date))?;
        }
        Ok(entry)
    }

    /// Recomputes one entry.
    ///
    /// Past dates on which the employee is active are finalized, creating
    /// the entry if it is missing. Any other date only recomputes an entry
    /// that already exists.
    pub fn recalculate_entry(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Option<TimesheetEntry>> {
        let today = self.today();
        let key = EntryKey::new(employee_id, date);
        let finalizing = date < today;
        let inputs = self.day_inputs(employee_id, date);
        if finalizing && self.sources.directory.is_active(employee_id, date) {
            self.store
                .upsert_with(&key, &mut |entry| {
                    self.compute_with(entry, &inputs, true, today);
                })
                .map(Some)
        } else {
            self.store.update_existing(&key, &mut |entry| {
                self.compute_with(entry, &inputs, finalizing, today);
            })
        }
    }

    /// Finalizes one entry of a day that has ended, creating it if missing.
    ///
    /// Returns the entry and whether it was created.
    pub fn finalize_entry(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> EngineResult<(TimesheetEntry, bool)> {
        let today = self.today();
        if date >= today {
            return Err(EngineError::DayNotEnded { date, today });
        }
        let key = EntryKey::new(employee_id, date);
        let created = self.store.get(&key)?.is_none();
        let inputs = self.day_inputs(employee_id, date);
        let entry = self.store.upsert_with(&key, &mut |entry| {
            self.compute_with(entry, &inputs, true, today);
        })?;
        Ok((entry, created))
    }

    /// Recomputes every entry a trigger affects.
    ///
    /// Monthly aggregates are not rolled up here; the months touched are
    /// returned so the caller can coalesce them.
    pub fn apply_trigger(&self, trigger: &RecalcTrigger) -> EngineResult<RecalcOutcome> {
        let mut outcome = RecalcOutcome::default();
        self.apply_trigger_into(trigger, &mut outcome)?;
        Ok(outcome)
    }

    /// Like [`apply_trigger`](Self::apply_trigger), recording progress in
    /// `outcome` as entries are written. On error, `outcome` still holds the
    /// months rewritten before the failure.
    pub fn apply_trigger_into(
        &self,
        trigger: &RecalcTrigger,
        outcome: &mut RecalcOutcome,
    ) -> EngineResult<()> {
        let today = self.today();
        let scope = trigger.affected_scope(self.sources.directory.as_ref(), today)?;
        if scope.is_empty() {
            debug!(trigger = trigger.kind(), "Trigger affects no dates");
            return Ok(());
        }

        for employee_id in &scope.employees {
            for date in scope.dates() {
                if self.recalculate_entry(employee_id, date)?.is_some() {
                    outcome.recalculated += 1;
                    outcome
                        .touched_months
                        .insert((employee_id.clone(), MonthKey::of(date)));
                }
            }
        }

        info!(
            trigger = trigger.kind(),
            employees = scope.employees.len(),
            from = %scope.from,
            to = %scope.to,
            recalculated = outcome.recalculated,
            "Trigger applied"
        );
        Ok(())
    }

    /// Applies a trigger and rolls up every month it touched.
    pub fn apply_trigger_now(&self, trigger: &RecalcTrigger) -> EngineResult<RecalcOutcome> {
        let outcome = self.apply_trigger(trigger)?;
        for (employee_id, month) in &outcome.touched_months {
            self.rollup_month(employee_id, *month)?;
        }
        Ok(outcome)
    }

    /// Rolls up a month, then every later stored month of the employee so
    /// the leave balance chains forward.
    pub fn rollup_month(&self, employee_id: &str, month: MonthKey) -> EngineResult<MonthlyTimesheet> {
        let monthly = self.rollup_single(employee_id, month)?;
        for later in self.store.monthlies_after(employee_id, month)? {
            self.rollup_single(employee_id, later)?;
        }
        Ok(monthly)
    }

    /// The balance a month opens with: the last stored month's remainder
    /// plus the accrual of any months in between that have no aggregate.
    fn opening_balance(&self, employee_id: &str, month: MonthKey) -> EngineResult<Decimal> {
        Ok(match self.store.latest_monthly_before(employee_id, month)? {
            Some(previous) => {
                let skipped = month.months_since(previous.month) - 1;
                previous.remaining_leave_balance
                    + self.leave.monthly_accrual * Decimal::from(skipped.max(0))
            }
            None => self.leave.initial_balance,
        })
    }

    fn rollup_single(&self, employee_id: &str, month: MonthKey) -> EngineResult<MonthlyTimesheet> {
        let opening = self.opening_balance(employee_id, month)?;
        let entries = self.store.entries_in_month(employee_id, month)?;
        let monthly = roll_up_month(
            employee_id,
            month,
            &entries,
            LeaveBalance {
                opening,
                accrued: self.leave.monthly_accrual,
            },
        );
        self.store.put_monthly(monthly.clone())?;
        Ok(monthly)
    }

    /// Removes an entry as an administrative correction and rolls up its
    /// month.
    pub fn delete_entry(&self, employee_id: &str, date: NaiveDate) -> EngineResult<TimesheetEntry> {
        let removed = self
            .store
            .delete(&EntryKey::new(employee_id, date))?
            .ok_or_else(|| EngineError::EntryNotFound {
                employee_id: employee_id.to_string(),
                date,
            })?;
        info!(employee_id = %employee_id, date = %date, "Entry deleted");
        self.rollup_month(employee_id, MonthKey::of(date))?;
        Ok(removed)
    }

    /// Fetches an entry.
    pub fn entry(&self, employee_id: &str, date: NaiveDate) -> EngineResult<TimesheetEntry> {
        self.store
            .get(&EntryKey::new(employee_id, date))?
            .ok_or_else(|| EngineError::EntryNotFound {
                employee_id: employee_id.to_string(),
                date,
            })
    }

    /// The end-of-day pass: finalizes every active employee's entry for the
    /// date, creating missing ones, then rolls up the month.
    ///
    /// Only dates before today are accepted. Employees are split into chunks
    /// processed on the blocking pool. Safe to run more than once for the
    /// same date.
    pub async fn finalize_day(self: &Arc<Self>, date: NaiveDate) -> EngineResult<FinalizeReport> {
        let today = self.today();
        if date >= today {
            return Err(EngineError::DayNotEnded { date, today });
        }
        let started = Instant::now();
        let employees = self.sources.directory.active_employees(date);
        let chunk_size = employees.len().div_ceil(self.worker_count).max(1);

        let mut tasks = JoinSet::new();
        for chunk in employees.chunks(chunk_size) {
            let chunk = chunk.to_vec();
            let recalculator = Arc::clone(self);
            tasks.spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|employee_id| {
                        let result = recalculator.finalize_entry(&employee_id, date);
                        (employee_id, result)
                    })
                    .collect::<Vec<_>>()
            });
        }

        let mut report = FinalizeReport {
            date,
            employees: employees.len(),
            finalized: 0,
            created: 0,
            failed: Vec::new(),
            months_rolled_up: 0,
        };
        let mut finalized_employees = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let results = joined.map_err(|e| EngineError::CalculationError {
                message: format!("finalize worker failed: {}", e),
            })?;
            for (employee_id, result) in results {
                match result {
                    Ok((_, created)) => {
                        report.finalized += 1;
                        if created {
                            report.created += 1;
                        }
                        finalized_employees.push(employee_id);
                    }
                    Err(err) => {
                        warn!(employee_id = %employee_id, date = %date, error = %err, "Finalize failed");
                        report.failed.push(employee_id);
                    }
                }
            }
        }

        let month = MonthKey::of(date);
        for employee_id in &finalized_employees {
            match self.rollup_month(employee_id, month) {
                Ok(_) => report.months_rolled_up += 1,
                Err(err) => {
                    warn!(employee_id = %employee_id, month = %month, error = %err, "Rollup failed")
                }
            }
        }
        report.failed.sort();

        info!(
            date = %date,
            employees = report.employees,
            finalized = report.finalized,
            created = report.created,
            failed = report.failed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Finalize pass completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmployeeRecord;
    use crate::models::{
        AbsentReason, ApprovedRequest, AttendanceStatus, DayContext, DayType, PayTerms,
        RequestType, ScheduledSegment,
    };
    use crate::sources::{ExemptionPeriod, InMemoryDirectory, InMemoryExemptions, InMemoryRequests};
    use crate::store::InMemoryTimesheetStore;
    use chrono::{Datelike, NaiveTime, Weekday};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn make_date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn at(month: u32, day: u32, h: u32, m: u32) -> NaiveDateTime {
        make_date(month, day).and_hms_opt(h, m, 0).unwrap()
    }

    /// Mon-Fri two shifts, weekends off, compensatory on 2026-03-14.
    struct TestCalendar;

    impl CalendarSource for TestCalendar {
        fn day_context(&self, _employee_id: &str, date: NaiveDate) -> Option<DayContext> {
            let segments = vec![
                ScheduledSegment {
                    start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                },
                ScheduledSegment {
                    start: NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(17, 30, 0).unwrap(),
                },
            ];
            let (day_type, segments) = if date == make_date(3, 14) {
                (DayType::Compensatory, segments)
            } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                (DayType::Regular, vec![])
            } else {
                (DayType::Regular, segments)
            };
            let max_credit = Decimal::new(5, 1) * Decimal::from(segments.len());
            Some(DayContext {
                day_type,
                segments,
                max_credit,
                pay_terms: PayTerms::default(),
            })
        }
    }

    struct Fixture {
        recalculator: Arc<Recalculator>,
        requests: Arc<InMemoryRequests>,
        exemptions: Arc<InMemoryExemptions>,
        store: Arc<InMemoryTimesheetStore>,
    }

    fn fixture(today: NaiveDate) -> Fixture {
        let store = Arc::new(InMemoryTimesheetStore::new());
        let requests = Arc::new(InMemoryRequests::new());
        let exemptions = Arc::new(InMemoryExemptions::new());
        // emp_003 leaves at the end of March.
        let directory = Arc::new(InMemoryDirectory::new(
            [("emp_001", None), ("emp_002", None), ("emp_003", Some(make_date(3, 31)))]
                .into_iter()
                .map(|(id, active_to)| EmployeeRecord {
                    id: id.to_string(),
                    active_from: None,
                    active_to,
                })
                .collect(),
        ));
        let sources = Sources {
            calendar: Arc::new(TestCalendar),
            requests: requests.clone(),
            exemptions: exemptions.clone(),
            directory,
        };
        let recalculator = Recalculator::new(
            store.clone(),
            sources,
            CalculationPolicy::default(),
            LeavePolicy {
                initial_balance: dec("12"),
                monthly_accrual: dec("1"),
            },
        )
        .with_fixed_today(today)
        .with_worker_count(2);

        Fixture {
            recalculator: Arc::new(recalculator),
            requests,
            exemptions,
            store,
        }
    }

    fn paid_leave(id: u64, from: NaiveDate, to: NaiveDate) -> ApprovedRequest {
        ApprovedRequest {
            id,
            employee_id: "emp_001".to_string(),
            request_type: RequestType::LeavePaid,
            start_date: from,
            end_date: to,
            window: None,
            approved_at: at(2, 20, 9, 0),
        }
    }

    #[test]
    fn test_punch_today_stays_in_progress() {
        let f = fixture(make_date(3, 2));
        let entry = f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();

        assert_eq!(entry.status, Some(AttendanceStatus::NotOnTime));
        assert_eq!(entry.working_days, None);
        assert!(!entry.is_finalized);
    }

    #[test]
    fn test_second_punch_completes_the_day() {
        let f = fixture(make_date(3, 2));
        f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();
        let entry = f.recalculator.record_punch("emp_001", at(3, 2, 17, 30)).unwrap();

        assert_eq!(entry.status, Some(AttendanceStatus::OnTime));
        assert_eq!(entry.working_days, Some(dec("1.0")));
    }

    #[test]
    fn test_future_punch_is_rejected() {
        let f = fixture(make_date(3, 2));
        let result = f.recalculator.record_punch("emp_001", at(3, 3, 8, 0));
        assert!(matches!(result, Err(EngineError::InvalidPunch { .. })));
    }

    #[test]
    fn test_empty_employee_is_rejected() {
        let f = fixture(make_date(3, 2));
        let result = f.recalculator.record_punch("  ", at(3, 2, 8, 0));
        assert!(matches!(result, Err(EngineError::InvalidPunch { .. })));
    }

    #[test]
    fn test_late_punch_for_past_date_refinalizes_and_rolls_up() {
        let f = fixture(make_date(3, 3));
        let entry = f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();
        assert_eq!(entry.status, Some(AttendanceStatus::SinglePunch));

        let monthly = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(3, 2)))
            .unwrap()
            .unwrap();
        assert_eq!(monthly.total_working_days, dec("0.5"));
    }

    #[tokio::test]
    async fn test_finalize_day_creates_missing_entries() {
        let f = fixture(make_date(3, 3));
        f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();
        f.recalculator.record_punch("emp_002", at(3, 2, 8, 0)).unwrap();
        f.recalculator.record_punch("emp_002", at(3, 2, 17, 30)).unwrap();

        let report = f.recalculator.finalize_day(make_date(3, 2)).await.unwrap();

        assert_eq!(report.employees, 3);
        assert_eq!(report.finalized, 3);
        assert_eq!(report.created, 1);
        assert!(report.failed.is_empty());
        assert_eq!(report.months_rolled_up, 3);

        let absent = f.recalculator.entry("emp_003", make_date(3, 2)).unwrap();
        assert_eq!(absent.status, Some(AttendanceStatus::Absent));
        assert_eq!(absent.working_days, Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_finalize_day_is_idempotent() {
        let f = fixture(make_date(3, 3));
        f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();

        f.recalculator.finalize_day(make_date(3, 2)).await.unwrap();
        let first = f.store.entries_on(make_date(3, 2)).unwrap();
        let first_month = f.store.get_monthly("emp_001", MonthKey::of(make_date(3, 2))).unwrap();

        let report = f.recalculator.finalize_day(make_date(3, 2)).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(f.store.entries_on(make_date(3, 2)).unwrap(), first);
        assert_eq!(
            f.store.get_monthly("emp_001", MonthKey::of(make_date(3, 2))).unwrap(),
            first_month
        );
    }

    #[tokio::test]
    async fn test_finalize_rejects_days_that_have_not_ended() {
        let f = fixture(make_date(3, 10));

        for date in [make_date(3, 10), make_date(3, 11)] {
            let result = f.recalculator.finalize_day(date).await;
            assert!(matches!(result, Err(EngineError::DayNotEnded { .. })));
        }
        let result = f.recalculator.finalize_entry("emp_001", make_date(3, 10));
        assert!(matches!(result, Err(EngineError::DayNotEnded { .. })));

        assert!(f.store.entries_on(make_date(3, 10)).unwrap().is_empty());
        assert!(f.store.get_monthly("emp_001", MonthKey::of(make_date(3, 10))).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compensatory_day_absence_is_debt() {
        let f = fixture(make_date(3, 15));
        f.recalculator.finalize_day(make_date(3, 14)).await.unwrap();

        let entry = f.recalculator.entry("emp_001", make_date(3, 14)).unwrap();
        assert_eq!(entry.status, Some(AttendanceStatus::Absent));
        assert_eq!(entry.working_days, Some(dec("-1.0")));
    }

    #[test]
    fn test_request_approval_recomputes_past_range() {
        let f = fixture(make_date(3, 10));
        f.requests
            .approve(paid_leave(1, make_date(3, 2), make_date(3, 4)));

        let outcome = f
            .recalculator
            .apply_trigger_now(&RecalcTrigger::RequestApproved {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 2),
                end_date: make_date(3, 4),
            })
            .unwrap();

        assert_eq!(outcome.recalculated, 3);
        let entry = f.recalculator.entry("emp_001", make_date(3, 3)).unwrap();
        assert_eq!(entry.absent_reason, Some(AbsentReason::PaidLeave));
        assert_eq!(entry.working_days, Some(dec("1.0")));

        let monthly = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(3, 3)))
            .unwrap()
            .unwrap();
        assert_eq!(monthly.consumed_leave_days, dec("3"));
        assert_eq!(monthly.remaining_leave_balance, dec("10"));
    }

    #[test]
    fn test_request_in_the_future_only_touches_existing_entries() {
        let f = fixture(make_date(3, 2));
        f.requests
            .approve(paid_leave(1, make_date(3, 9), make_date(3, 10)));

        let outcome = f
            .recalculator
            .apply_trigger(&RecalcTrigger::RequestApproved {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 9),
                end_date: make_date(3, 10),
            })
            .unwrap();

        assert_eq!(outcome.recalculated, 0);
        assert!(f.store.entries_in_range("emp_001", make_date(3, 9), make_date(3, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_trigger_skips_dates_outside_employment() {
        let f = fixture(make_date(4, 10));

        let outcome = f
            .recalculator
            .apply_trigger_now(&RecalcTrigger::ScheduleChanged {
                employee_id: None,
                from: make_date(3, 30),
                to: Some(make_date(4, 2)),
            })
            .unwrap();

        // Four dates each for emp_001 and emp_002, two for emp_003.
        assert_eq!(outcome.recalculated, 10);
        assert!(f.store.get(&EntryKey::new("emp_003", make_date(3, 31))).unwrap().is_some());
        assert!(f.store.get(&EntryKey::new("emp_003", make_date(4, 1))).unwrap().is_none());
        assert!(f.store.get_monthly("emp_003", MonthKey::of(make_date(4, 1))).unwrap().is_none());
    }

    #[test]
    fn test_trigger_for_unknown_employee_creates_nothing() {
        let f = fixture(make_date(3, 10));

        let outcome = f
            .recalculator
            .apply_trigger_now(&RecalcTrigger::ExemptionChanged {
                employee_id: "emp_404".to_string(),
                from: make_date(3, 2),
                to: Some(make_date(3, 4)),
            })
            .unwrap();

        assert_eq!(outcome.recalculated, 0);
        assert!(f.store.entries_in_range("emp_404", make_date(3, 2), make_date(3, 4)).unwrap().is_empty());
    }

    #[test]
    fn test_existing_entry_outside_employment_is_still_recomputed() {
        let f = fixture(make_date(4, 10));
        f.recalculator.record_punch("emp_003", at(4, 1, 8, 0)).unwrap();

        let outcome = f
            .recalculator
            .apply_trigger(&RecalcTrigger::ScheduleChanged {
                employee_id: Some("emp_003".to_string()),
                from: make_date(4, 1),
                to: Some(make_date(4, 1)),
            })
            .unwrap();

        assert_eq!(outcome.recalculated, 1);
        let entry = f.recalculator.entry("emp_003", make_date(4, 1)).unwrap();
        assert_eq!(entry.status, Some(AttendanceStatus::SinglePunch));
        assert!(entry.is_finalized);
    }

    #[test]
    fn test_leave_self_heals_after_late_punches() {
        let f = fixture(make_date(3, 10));
        f.requests
            .approve(paid_leave(1, make_date(3, 2), make_date(3, 2)));
        f.recalculator
            .apply_trigger_now(&RecalcTrigger::RequestApproved {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 2),
                end_date: make_date(3, 2),
            })
            .unwrap();
        let month = MonthKey::of(make_date(3, 2));
        assert_eq!(
            f.store.get_monthly("emp_001", month).unwrap().unwrap().consumed_leave_days,
            dec("1")
        );

        // Punches imported late show the employee came in.
        f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();
        let entry = f.recalculator.record_punch("emp_001", at(3, 2, 17, 30)).unwrap();
        assert_eq!(entry.absent_reason, None);

        let monthly = f.store.get_monthly("emp_001", month).unwrap().unwrap();
        assert_eq!(monthly.consumed_leave_days, Decimal::ZERO);
        assert_eq!(monthly.remaining_leave_balance, dec("13"));
    }

    #[test]
    fn test_revocation_restores_absence() {
        let f = fixture(make_date(3, 10));
        f.requests
            .approve(paid_leave(1, make_date(3, 3), make_date(3, 3)));
        let approved = RecalcTrigger::RequestApproved {
            employee_id: "emp_001".to_string(),
            request_id: 1,
            start_date: make_date(3, 3),
            end_date: make_date(3, 3),
        };
        f.recalculator.apply_trigger_now(&approved).unwrap();

        f.requests.revoke(1);
        f.recalculator
            .apply_trigger_now(&RecalcTrigger::RequestRevoked {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 3),
                end_date: make_date(3, 3),
            })
            .unwrap();

        let entry = f.recalculator.entry("emp_001", make_date(3, 3)).unwrap();
        assert_eq!(entry.absent_reason, None);
        assert_eq!(entry.status, Some(AttendanceStatus::Absent));
        assert_eq!(entry.working_days, Some(Decimal::ZERO));
    }

    #[test]
    fn test_exemption_change_applies_up_to_today_only() {
        let f = fixture(make_date(3, 4));
        f.recalculator.record_punch("emp_001", at(3, 4, 8, 0)).unwrap();
        f.exemptions.exempt(
            "emp_001",
            ExemptionPeriod {
                from: make_date(3, 2),
                to: None,
            },
        );

        let outcome = f
            .recalculator
            .apply_trigger_now(&RecalcTrigger::ExemptionChanged {
                employee_id: "emp_001".to_string(),
                from: make_date(3, 2),
                to: None,
            })
            .unwrap();

        // 2nd and 3rd created and finalized, 4th (today) recomputed in place.
        assert_eq!(outcome.recalculated, 3);
        let past = f.recalculator.entry("emp_001", make_date(3, 3)).unwrap();
        assert_eq!(past.status, Some(AttendanceStatus::OnTime));
        assert_eq!(past.working_days, Some(dec("1.0")));
        assert!(past.is_finalized);

        let today = f.recalculator.entry("emp_001", make_date(3, 4)).unwrap();
        assert_eq!(today.status, Some(AttendanceStatus::OnTime));
        assert!(!today.is_finalized);
    }

    #[test]
    fn test_triggers_converge() {
        let f = fixture(make_date(3, 10));
        f.requests
            .approve(paid_leave(1, make_date(3, 2), make_date(3, 6)));
        let trigger = RecalcTrigger::RequestApproved {
            employee_id: "emp_001".to_string(),
            request_id: 1,
            start_date: make_date(3, 2),
            end_date: make_date(3, 6),
        };
        let schedule = RecalcTrigger::ScheduleChanged {
            employee_id: Some("emp_001".to_string()),
            from: make_date(3, 1),
            to: Some(make_date(3, 9)),
        };

        f.recalculator.apply_trigger_now(&trigger).unwrap();
        f.recalculator.apply_trigger_now(&schedule).unwrap();
        let first = f
            .store
            .entries_in_range("emp_001", make_date(3, 1), make_date(3, 9))
            .unwrap();

        f.recalculator.apply_trigger_now(&schedule).unwrap();
        f.recalculator.apply_trigger_now(&trigger).unwrap();
        f.recalculator.apply_trigger_now(&trigger).unwrap();
        let second = f
            .store
            .entries_in_range("emp_001", make_date(3, 1), make_date(3, 9))
            .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_leave_balance_chains_across_months() {
        let f = fixture(make_date(4, 10));
        f.requests
            .approve(paid_leave(1, make_date(3, 2), make_date(3, 3)));
        f.recalculator
            .apply_trigger_now(&RecalcTrigger::ScheduleChanged {
                employee_id: Some("emp_001".to_string()),
                from: make_date(4, 1),
                to: Some(make_date(4, 1)),
            })
            .unwrap();
        let april = MonthKey::of(make_date(4, 1));
        assert_eq!(
            f.store.get_monthly("emp_001", april).unwrap().unwrap().opening_leave_balance,
            dec("12")
        );

        // March is rolled up after April already exists; April must re-chain.
        f.recalculator
            .apply_trigger_now(&RecalcTrigger::RequestApproved {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 2),
                end_date: make_date(3, 3),
            })
            .unwrap();

        let march = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(3, 2)))
            .unwrap()
            .unwrap();
        assert_eq!(march.remaining_leave_balance, dec("11"));
        let april = f.store.get_monthly("emp_001", april).unwrap().unwrap();
        assert_eq!(april.opening_leave_balance, dec("11"));
        assert_eq!(april.remaining_leave_balance, dec("12"));
    }

    #[test]
    fn test_opening_balance_accrues_over_months_without_aggregate() {
        let f = fixture(make_date(6, 10));
        let schedule = |day: NaiveDate| RecalcTrigger::ScheduleChanged {
            employee_id: Some("emp_001".to_string()),
            from: day,
            to: Some(day),
        };

        f.recalculator.apply_trigger_now(&schedule(make_date(3, 2))).unwrap();
        f.recalculator.apply_trigger_now(&schedule(make_date(5, 4))).unwrap();

        assert!(f.store.get_monthly("emp_001", MonthKey::of(make_date(4, 1))).unwrap().is_none());
        // March closes at 13; April accrues one more without an aggregate.
        let may = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(5, 4)))
            .unwrap()
            .unwrap();
        assert_eq!(may.opening_leave_balance, dec("14"));
        assert_eq!(may.remaining_leave_balance, dec("15"));

        // Leave taken in March still flows through to May.
        f.requests
            .approve(paid_leave(1, make_date(3, 3), make_date(3, 3)));
        f.recalculator
            .apply_trigger_now(&RecalcTrigger::RequestApproved {
                employee_id: "emp_001".to_string(),
                request_id: 1,
                start_date: make_date(3, 3),
                end_date: make_date(3, 3),
            })
            .unwrap();
        let may = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(5, 4)))
            .unwrap()
            .unwrap();
        assert_eq!(may.opening_leave_balance, dec("13"));
    }

    #[test]
    fn test_delete_entry_rolls_up_month() {
        let f = fixture(make_date(3, 10));
        f.recalculator.record_punch("emp_001", at(3, 2, 8, 0)).unwrap();
        f.recalculator.record_punch("emp_001", at(3, 2, 17, 30)).unwrap();

        f.recalculator.delete_entry("emp_001", make_date(3, 2)).unwrap();
        let monthly = f
            .store
            .get_monthly("emp_001", MonthKey::of(make_date(3, 2)))
            .unwrap()
            .unwrap();
        assert_eq!(monthly.entry_count, 0);

        let missing = f.recalculator.delete_entry("emp_001", make_date(3, 2));
        assert!(matches!(missing, Err(EngineError::EntryNotFound { .. })));
    }
}
