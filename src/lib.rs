//! Voice Booking: booking-request intake for a vocal coaching studio.

pub mod booking;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod routes;
pub mod session;
