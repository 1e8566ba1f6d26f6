pub mod auth;
pub mod bookings;
pub mod conversations;
pub mod health;
pub mod requests;
pub mod spaces;
pub mod users;
pub mod ws;
