pub mod activity;
pub mod rate_limit;
