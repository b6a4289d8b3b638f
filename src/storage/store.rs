use std::collections::HashMap;

use chrono::{DateTime, Datelike, FixedOffset};
use parking_lot::Mutex;

use crate::storage::error::StoreError;
use crate::storage::record::{RecordId, Temperature};

#[derive(Debug, Default)]
struct Inner {
    temperatures: HashMap<RecordId, Temperature>,
    // never rewound, not even by delete_all
    next_id: RecordId,
}

/// In-memory temperature records behind one exclusive lock.
///
/// Every operation, reads included, holds the lock for its whole duration, so
/// callers never observe a half-applied write and concurrent creates always
/// get distinct ids. Results of scans come back in no particular order.
#[derive(Debug, Default)]
pub struct TemperatureStore {
    inner: Mutex<Inner>,
}

impl TemperatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new reading and return the id assigned to it.
    pub fn create(&self, value: i64, city: String, datetime: DateTime<FixedOffset>) -> RecordId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.temperatures.insert(
            id,
            Temperature {
                id,
                value,
                city,
                datetime,
            },
        );
        inner.next_id += 1;
        id
    }

    pub fn get(&self, id: RecordId) -> Result<Temperature, StoreError> {
        self.inner
            .lock()
            .temperatures
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.inner
            .lock()
            .temperatures
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    /// Remove every record. Ids issued before the call are still never reused.
    pub fn delete_all(&self) {
        self.inner.lock().temperatures.clear();
    }

    pub fn list(&self) -> Vec<Temperature> {
        self.inner.lock().temperatures.values().cloned().collect()
    }

    /// Records whose city equals `city` exactly (case-sensitive).
    pub fn find_by_city(&self, city: &str) -> Vec<Temperature> {
        self.scan(|t| t.city == city)
    }

    /// Records taken on the given calendar day, ignoring time of day. No range
    /// checks: an impossible date simply matches nothing.
    pub fn find_by_date(&self, year: i64, month: u32, day: i64) -> Vec<Temperature> {
        self.scan(|t| {
            let date = t.datetime.date_naive();
            i64::from(date.year()) == year && date.month() == month && i64::from(date.day()) == day
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scan(&self, pred: impl Fn(&Temperature) -> bool) -> Vec<Temperature> {
        self.inner
            .lock()
            .temperatures
            .values()
            .filter(|t| pred(t))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn sorted_ids(records: &[Temperature]) -> Vec<RecordId> {
        let mut ids: Vec<_> = records.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn create_then_get_returns_same_fields() {
        let store = TemperatureStore::new();
        let at = ts("2024-03-01T10:00:00+02:00");
        let id = store.create(-7, "Oslo".to_string(), at);

        let t = store.get(id).unwrap();
        assert_eq!(t.id, id);
        assert_eq!(t.value, -7);
        assert_eq!(t.city, "Oslo");
        assert_eq!(t.datetime, at);
        assert_eq!(t.datetime.offset(), at.offset());
    }

    #[test]
    fn ids_start_at_zero_and_increase() {
        let store = TemperatureStore::new();
        let at = ts("2024-01-01T00:00:00Z");
        assert_eq!(store.create(1, "a".into(), at), 0);
        assert_eq!(store.create(2, "b".into(), at), 1);
        assert_eq!(store.create(3, "c".into(), at), 2);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = TemperatureStore::new();
        assert_eq!(store.get(3), Err(StoreError::NotFound(3)));
    }

    #[test]
    fn delete_is_final() {
        let store = TemperatureStore::new();
        let id = store.create(20, "Rome".into(), ts("2024-05-05T12:00:00Z"));

        store.delete(id).unwrap();
        assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn failed_delete_leaves_store_untouched() {
        let store = TemperatureStore::new();
        let id = store.create(20, "Rome".into(), ts("2024-05-05T12:00:00Z"));

        assert!(store.delete(id + 1).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.get(id).is_ok());
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let store = TemperatureStore::new();
        let at = ts("2024-01-01T00:00:00Z");
        let a = store.create(1, "x".into(), at);
        let b = store.create(2, "x".into(), at);
        store.delete(b).unwrap();

        let c = store.create(3, "x".into(), at);
        assert!(c > b && c > a);
    }

    #[test]
    fn delete_all_empties_but_keeps_counter() {
        let store = TemperatureStore::new();
        let at = ts("2024-01-01T00:00:00Z");
        for i in 0..5 {
            store.create(i, "x".into(), at);
        }
        store.delete_all();
        assert!(store.list().is_empty());

        assert_eq!(store.create(9, "x".into(), at), 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_store_scans_are_empty() {
        let store = TemperatureStore::new();
        assert!(store.list().is_empty());
        assert!(store.find_by_city("Paris").is_empty());
        assert!(store.find_by_date(2024, 3, 1).is_empty());
    }

    #[test]
    fn find_by_city_is_exact() {
        let store = TemperatureStore::new();
        let at = ts("2024-01-01T00:00:00Z");
        let p1 = store.create(1, "Paris".into(), at);
        store.create(2, "paris".into(), at);
        store.create(3, "Paris ".into(), at);
        let p2 = store.create(4, "Paris".into(), at);
        store.create(5, "".into(), at);

        assert_eq!(sorted_ids(&store.find_by_city("Paris")), vec![p1, p2]);
        assert_eq!(store.find_by_city("").len(), 1);
        assert!(store.find_by_city("Par").is_empty());
    }

    #[test]
    fn find_by_date_ignores_time_of_day() {
        let store = TemperatureStore::new();
        let a = store.create(1, "x".into(), ts("2024-03-01T10:00:00Z"));
        let b = store.create(2, "x".into(), ts("2024-03-01T23:59:00Z"));
        store.create(3, "x".into(), ts("2024-03-02T00:00:00Z"));

        assert_eq!(sorted_ids(&store.find_by_date(2024, 3, 1)), vec![a, b]);
    }

    #[test]
    fn find_by_date_uses_stored_offset() {
        let store = TemperatureStore::new();
        // 2024-03-01 in UTC, but the reading was taken on March 2nd locally
        let id = store.create(1, "Tokyo".into(), ts("2024-03-02T01:00:00+09:00"));

        assert!(store.find_by_date(2024, 3, 1).is_empty());
        assert_eq!(sorted_ids(&store.find_by_date(2024, 3, 2)), vec![id]);
    }

    #[test]
    fn impossible_dates_match_nothing() {
        let store = TemperatureStore::new();
        store.create(1, "x".into(), ts("2024-02-29T08:00:00Z"));

        assert!(store.find_by_date(2024, 2, 30).is_empty());
        assert!(store.find_by_date(2024, 2, -1).is_empty());
        assert!(store.find_by_date(2024, 13, 1).is_empty());
        assert_eq!(store.find_by_date(2024, 2, 29).len(), 1);
    }

    #[test]
    fn far_past_and_future_timestamps_are_accepted() {
        let store = TemperatureStore::new();
        let old = store.create(0, "x".into(), ts("0001-01-01T00:00:00Z"));
        let new = store.create(0, "x".into(), ts("9999-12-31T23:59:59Z"));

        assert_eq!(sorted_ids(&store.find_by_date(1, 1, 1)), vec![old]);
        assert_eq!(sorted_ids(&store.find_by_date(9999, 12, 31)), vec![new]);
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(TemperatureStore::new());
        let at = ts("2024-01-01T00:00:00Z");
        let threads = 8;
        let per_thread = 250;

        let handles: Vec<_> = (0..threads)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|i| store.create(i, format!("city-{n}"), at))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(ids.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(ids.len(), threads * per_thread as usize);
        assert_eq!(store.list().len(), threads * per_thread as usize);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Delete(usize),
        DeleteAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Create),
            2 => any::<usize>().prop_map(Op::Delete),
            1 => Just(Op::DeleteAll),
        ]
    }

    proptest! {
        #[test]
        fn new_ids_exceed_every_issued_id(ops in prop::collection::vec(op(), 0..64)) {
            let store = TemperatureStore::new();
            let at = ts("2024-01-01T00:00:00Z");
            let mut issued: Vec<RecordId> = Vec::new();
            let mut live: Vec<RecordId> = Vec::new();

            for op in ops {
                match op {
                    Op::Create => {
                        let id = store.create(0, "x".into(), at);
                        prop_assert!(issued.iter().all(|&prev| id > prev));
                        issued.push(id);
                        live.push(id);
                    }
                    Op::Delete(i) if !live.is_empty() => {
                        let id = live.swap_remove(i % live.len());
                        prop_assert!(store.delete(id).is_ok());
                    }
                    Op::Delete(_) => {}
                    Op::DeleteAll => {
                        store.delete_all();
                        live.clear();
                    }
                }
                prop_assert_eq!(store.len(), live.len());
            }
        }
    }
}
