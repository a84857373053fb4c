use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
/// Tune these based on real enrollment counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static ENROLLMENT_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

/// Enrollment numbers are uppercase identifiers like STU2025001.
#[inline]
fn normalize(enrollment_number: &str) -> String {
    enrollment_number.trim().to_uppercase()
}

/// Check if an enrollment number might exist (false positives possible)
pub fn might_exist(enrollment_number: &str) -> bool {
    let enrollment_number = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .read()
        .expect("enrollment filter poisoned")
        .contains(&enrollment_number)
}

/// Insert a single enrollment number into the filter
pub fn insert(enrollment_number: &str) {
    let enrollment_number = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .write()
        .expect("enrollment filter poisoned")
        .add(&enrollment_number);
}

/// Remove an enrollment number from the filter
pub fn remove(enrollment_number: &str) {
    let enrollment_number = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .write()
        .expect("enrollment filter poisoned")
        .remove(&enrollment_number);
}

/// Warm up the enrollment filter using streaming + batching
pub async fn warmup_enrollment_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (String,)>("SELECT enrollment_number FROM users").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (enrollment_number,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&enrollment_number));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Enrollment filter warmup complete: {} users", total);
    Ok(())
}

/// Insert a batch of normalized enrollment numbers
fn insert_batch(enrollment_numbers: &[String]) {
    let mut filter = ENROLLMENT_FILTER
        .write()
        .expect("enrollment filter poisoned");

    for enrollment_number in enrollment_numbers {
        filter.add(enrollment_number);
    }
}
