//! Daylist: a personal list manager behind local and Google sign-in.
//!
//! - [`store`] persists users, items and sessions in SQLite
//! - [`auth`] verifies credentials for the local and federated strategies
//! - [`session`] binds authenticated users to cookie-borne sessions
//! - [`gateway`] serves the HTML pages and gates every item route

pub mod auth;
pub mod config;
pub mod gateway;
pub mod session;
pub mod store;
