pub mod db_utils;
pub mod enrollment_cache;
pub mod enrollment_filter;
