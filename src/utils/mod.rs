pub mod email_cache;
pub mod email_filter;
pub mod geofence;
pub mod shift_status;
pub mod shift_time;
