pub mod bookings;
pub mod comments;
pub mod profile;
pub mod quests;
pub mod ratings;
