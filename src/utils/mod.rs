pub mod db_utils;
pub mod roster_cache;
pub mod username_filter;
