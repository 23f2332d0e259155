use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};

/// Counting notification channel.  Each `wait` returns once at least
/// one `notify` has happened since the previous `wait`.
#[derive(Clone, Default)]
pub struct Notify {
    pair: Arc<(Mutex<usize>, Condvar)>,
}

impl Notify {
    pub fn notify(&self) {
        let mut lock = self.pair.0.lock().unwrap();
        *lock = lock.wrapping_add(1);
        self.pair.1.notify_one();
    }

    /// Returns the number of notifications seen since the last call
    pub fn wait(&self, seen: &mut usize) -> usize {
        let mut lock = self.pair.0.lock().unwrap();
        while *lock == *seen {
            lock = self.pair.1.wait(lock).unwrap();
        }
        let count = lock.wrapping_sub(*seen);
        *seen = *lock;
        count
    }
}

/// Histogram of small counts, for reporting
#[derive(Default)]
pub struct Tally(BTreeMap<usize, usize>);

impl Tally {
    pub fn add(&mut self, value: usize) {
        *self.0.entry(value).or_insert(0) += 1;
    }

    pub fn report(&self, label: &str) {
        let parts: Vec<String> = self.0.iter().map(|(v, n)| format!("{}x{}", v, n)).collect();
        println!("{}: {}", label, parts.join(" "));
    }
}
