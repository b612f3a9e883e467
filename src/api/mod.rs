pub mod attendance;
pub mod health;
pub mod location;
pub mod shift;
pub mod user;
