use crate::model::student::RosterEntry;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

/// Active students per class, cached between capture sessions. Any write to
/// a class's students must call `invalidate`.
#[derive(Clone)]
pub struct RosterCache {
    cache: Cache<u64, Arc<Vec<RosterEntry>>>,
}

impl RosterCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(5_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn roster(&self, pool: &MySqlPool, class_id: u64) -> Result<Arc<Vec<RosterEntry>>, sqlx::Error> {
        if let Some(roster) = self.cache.get(&class_id).await {
            return Ok(roster);
        }

        let students = sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT id, roll_number, first_name, last_name
            FROM students
            WHERE class_id = ? AND is_active = TRUE
            ORDER BY roll_number
            "#,
        )
        .bind(class_id)
        .fetch_all(pool)
        .await?;

        let roster = Arc::new(students);
        self.cache.insert(class_id, roster.clone()).await;
        tracing::debug!(class_id, size = roster.len(), "Roster loaded");
        Ok(roster)
    }

    pub async fn invalidate(&self, class_id: u64) {
        self.cache.invalidate(&class_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::mysql::MySqlPoolOptions;

    fn entry(id: u64) -> RosterEntry {
        RosterEntry {
            id,
            roll_number: id.to_string(),
            first_name: format!("S{id}"),
            last_name: None,
        }
    }

    #[actix_web::test]
    async fn cached_roster_is_served_without_the_database() {
        // never connected; any query would fail
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://nobody@127.0.0.1:1/none")
            .unwrap();
        let cache = RosterCache::new(Duration::from_secs(60));
        cache.cache.insert(3, Arc::new(vec![entry(1), entry(2)])).await;

        let roster = cache.roster(&pool, 3).await.unwrap();
        assert_eq!(roster.len(), 2);

        cache.invalidate(3).await;
        assert!(cache.cache.get(&3).await.is_none());
    }
}
