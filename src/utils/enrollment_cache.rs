use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// true  => enrollment number is TAKEN
/// false => AVAILABLE (usually we store only taken)
pub static ENROLLMENT_CACHE: Lazy<Cache<String, bool>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(500_000) // tune based on memory
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

#[inline]
fn normalize(enrollment_number: &str) -> String {
    enrollment_number.trim().to_uppercase()
}

/// Mark a single enrollment number as taken
pub async fn mark_taken(enrollment_number: &str) {
    ENROLLMENT_CACHE
        .insert(normalize(enrollment_number), true)
        .await;
}

/// Check if an enrollment number is taken
pub async fn is_taken(enrollment_number: &str) -> bool {
    ENROLLMENT_CACHE
        .get(&normalize(enrollment_number))
        .await
        .unwrap_or(false)
}

/// Batch mark enrollment numbers as taken
async fn batch_mark(enrollment_numbers: &[String]) {
    let futures: Vec<_> = enrollment_numbers
        .iter()
        .map(|e| ENROLLMENT_CACHE.insert(normalize(e), true))
        .collect();

    // Await all insertions concurrently
    futures::future::join_all(futures).await;
}

/// Load only RECENT enrollment numbers into the in-memory cache (batched)
pub async fn warmup_enrollment_cache(
    pool: &MySqlPool,
    days: u32,
    batch_size: usize,
) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT enrollment_number
        FROM users
        WHERE last_login_at >= NOW() - INTERVAL ? DAY
        ORDER BY last_login_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let (enrollment_number,) = row?;
        batch.push(enrollment_number);
        total_count += 1;

        if batch.len() >= batch_size {
            batch_mark(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_mark(&batch).await;
    }

    log::info!(
        "Enrollment cache warmup complete: {} recent users (last {} days)",
        total_count,
        days
    );

    Ok(())
}
