//! API endpoint handlers, one module per clinic service area.

pub mod auth;
pub mod common;
pub mod diversion;
pub mod dosing;
pub mod dual_eligible;
pub mod equity;
pub mod facility;
pub mod health;
pub mod insurance;
pub mod labs;
pub mod otp_billing;
pub mod patients;
pub mod pmp;
pub mod prior_auth;
pub mod support;
pub mod vaccinations;
