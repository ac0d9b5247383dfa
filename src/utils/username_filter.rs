use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use sqlx::MySqlPool;
use std::sync::{Arc, RwLock};

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 20_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Probabilistic "has this username been taken" precheck in front of the
/// users table. A negative answer is definitive; a positive one must be
/// confirmed against the database.
#[derive(Clone)]
pub struct UsernameFilter {
    inner: Arc<RwLock<CuckooFilter<String>>>,
}

impl Default for UsernameFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn normalize(username: &str) -> String {
    username.trim().to_lowercase()
}

impl UsernameFilter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CuckooFilter::new(
                FILTER_CAPACITY,
                FALSE_POSITIVE_RATE,
            ))),
        }
    }

    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&username)
    }

    pub fn insert(&self, username: &str) {
        self.insert_batch(&[normalize(username)]);
    }

    fn insert_batch(&self, usernames: &[String]) {
        let mut filter = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for username in usernames {
            filter.add(username);
        }
    }

    /// Streams every account name into the filter in batches.
    pub async fn warmup(&self, pool: &MySqlPool, batch_size: usize) -> Result<usize> {
        let mut stream = sqlx::query_as::<_, (String,)>("SELECT username FROM users").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0usize;

        while let Some(row) = stream.next().await {
            let (username,) = row.map_err(|e| anyhow!("username row fetch failed: {}", e))?;
            batch.push(normalize(&username));
            total += 1;

            if batch.len() == batch_size {
                self.insert_batch(&batch);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.insert_batch(&batch);
        }

        log::info!("Username filter warmup complete: {} accounts", total);
        Ok(total)
    }
}
