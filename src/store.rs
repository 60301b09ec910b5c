//! Persistence boundary for timesheet entries and monthly aggregates.
//!
//! The unit of mutation is one entry. [`TimesheetStore::upsert_with`] hands
//! the closure a copy of the entry and writes the result back in one step, so
//! an entry is never partially persisted and concurrent writers to the same
//! (employee, date) are serialized.

use chrono::NaiveDate;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use crate::error::{EngineError, EngineResult};
use crate::models::{EntryKey, MonthKey, MonthlyTimesheet, TimesheetEntry};

/// Storage for entries and monthly aggregates.
pub trait TimesheetStore: Send + Sync {
    /// Fetches one entry.
    fn get(&self, key: &EntryKey) -> EngineResult<Option<TimesheetEntry>>;

    /// Applies `update` to the entry, creating an empty one first if needed,
    /// and returns the stored result.
    fn upsert_with(
        &self,
        key: &EntryKey,
        update: &mut dyn FnMut(&mut TimesheetEntry),
    ) -> EngineResult<TimesheetEntry>;

    /// Applies `update` only if the entry exists.
    fn update_existing(
        &self,
        key: &EntryKey,
        update: &mut dyn FnMut(&mut TimesheetEntry),
    ) -> EngineResult<Option<TimesheetEntry>>;

    /// Entries of an employee between two dates, inclusive, in date order.
    fn entries_in_range(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<TimesheetEntry>>;

    /// Entries of all employees on a date.
    fn entries_on(&self, date: NaiveDate) -> EngineResult<Vec<TimesheetEntry>>;

    /// Removes an entry, returning it if it existed.
    fn delete(&self, key: &EntryKey) -> EngineResult<Option<TimesheetEntry>>;

    /// Fetches a monthly aggregate.
    fn get_monthly(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> EngineResult<Option<MonthlyTimesheet>>;

    /// Stores a monthly aggregate, replacing any previous one.
    fn put_monthly(&self, monthly: MonthlyTimesheet) -> EngineResult<()>;

    /// Months after `month` with a stored aggregate for the employee, in order.
    fn monthlies_after(&self, employee_id: &str, month: MonthKey) -> EngineResult<Vec<MonthKey>>;

    /// The most recent stored aggregate of the employee before `month`.
    fn latest_monthly_before(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> EngineResult<Option<MonthlyTimesheet>>;

    /// Entries of an employee in a month.
    fn entries_in_month(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> EngineResult<Vec<TimesheetEntry>> {
        match (month.first_day(), month.last_day()) {
            (Some(from), Some(to)) => self.entries_in_range(employee_id, from, to),
            _ => Err(EngineError::CalculationError {
                message: format!("Invalid month: {}", month),
            }),
        }
    }
}

const SHARD_COUNT: usize = 16;

type EntryShard = BTreeMap<EntryKey, TimesheetEntry>;

fn shard_index(employee_id: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    employee_id.hash(&mut hasher);
    (hasher.finish() % SHARD_COUNT as u64) as usize
}

fn lock<T>(mutex: &Mutex<T>) -> EngineResult<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| EngineError::Storage {
        message: "timesheet store lock poisoned".to_string(),
    })
}

/// A store kept in process memory.
///
/// Entries are sharded by employee: writes for different employees rarely
/// wait on each other, and an employee's range queries touch one shard.
///
/// # Example
///
/// ```
/// use timesheet_engine::models::EntryKey;
/// use timesheet_engine::store::{InMemoryTimesheetStore, TimesheetStore};
/// use chrono::NaiveDate;
///
/// let store = InMemoryTimesheetStore::new();
/// let key = EntryKey::new("emp_001", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
///
/// let entry = store.upsert_with(&key, &mut |entry| entry.needs_review = true).unwrap();
/// assert!(entry.needs_review);
/// assert!(store.get(&key).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct InMemoryTimesheetStore {
    shards: Vec<Mutex<EntryShard>>,
    monthly: Mutex<HashMap<String, BTreeMap<MonthKey, MonthlyTimesheet>>>,
}

impl Default for InMemoryTimesheetStore {
    fn default() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::default()).collect(),
            monthly: Mutex::default(),
        }
    }
}

impl InMemoryTimesheetStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, employee_id: &str) -> EngineResult<MutexGuard<'_, EntryShard>> {
        lock(&self.shards[shard_index(employee_id)])
    }
}

impl TimesheetStore for InMemoryTimesheetStore {
    fn get(&self, key: &EntryKey) -> EngineResult<Option<TimesheetEntry>> {
        Ok(self.shard(&key.employee_id)?.get(key).cloned())
    }

    fn upsert_with(
        &self,
        key: &EntryKey,
        update: &mut dyn FnMut(&mut TimesheetEntry),
    ) -> EngineResult<TimesheetEntry> {
        let mut entries = self.shard(&key.employee_id)?;
        let mut entry = entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| TimesheetEntry::new(key.employee_id.clone(), key.date));
        update(&mut entry);
        entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }

    fn update_existing(
        &self,
        key: &EntryKey,
        update: &mut dyn FnMut(&mut TimesheetEntry),
    ) -> EngineResult<Option<TimesheetEntry>> {
        let mut entries = self.shard(&key.employee_id)?;
        let Some(mut entry) = entries.get(key).cloned() else {
            return Ok(None);
        };
        update(&mut entry);
        entries.insert(key.clone(), entry.clone());
        Ok(Some(entry))
    }

    fn entries_in_range(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<TimesheetEntry>> {
        if to < from {
            return Err(EngineError::InvalidDateRange { from, to });
        }
        let entries = self.shard(employee_id)?;
        let range = EntryKey::new(employee_id, from)..=EntryKey::new(employee_id, to);
        Ok(entries.range(range).map(|(_, e)| e.clone()).collect())
    }

    fn entries_on(&self, date: NaiveDate) -> EngineResult<Vec<TimesheetEntry>> {
        let mut found = Vec::new();
        for shard in &self.shards {
            found.extend(lock(shard)?.values().filter(|e| e.date == date).cloned());
        }
        found.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Ok(found)
    }

    fn delete(&self, key: &EntryKey) -> EngineResult<Option<TimesheetEntry>> {
        Ok(self.shard(&key.employee_id)?.remove(key))
    }

    fn get_monthly(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> EngineResult<Option<MonthlyTimesheet>> {
        Ok(lock(&self.monthly)?
            .get(employee_id)
            .and_then(|months| months.get(&month))
            .cloned())
    }

    fn put_monthly(&self, monthly: MonthlyTimesheet) -> EngineResult<()> {
        lock(&self.monthly)?
            .entry(monthly.employee_id.clone())
            .or_default()
            .insert(monthly.month, monthly);
        Ok(())
    }

    fn monthlies_after(&self, employee_id: &str, month: MonthKey) -> EngineResult<Vec<MonthKey>> {
        Ok(lock(&self.monthly)?
            .get(employee_id)
            .map(|months| {
                months
                    .range(month.next()..)
                    .map(|(key, _)| *key)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_monthly_before(
        &self,
        employee_id: &str,
        month: MonthKey,
    ) -> EngineResult<Option<MonthlyTimesheet>> {
        Ok(lock(&self.monthly)?
            .get(employee_id)
            .and_then(|months| months.range(..month).next_back())
            .map(|(_, monthly)| monthly.clone()))
    }
}
