//! Application services on top of the data-access layer.
//!
//! Every operation takes the calling user's id and only touches records that
//! user owns.

pub mod auth;
pub mod board;
pub mod calendar;
pub mod config;
pub mod email;
pub mod notification;
pub mod profile;
pub mod reminders;
