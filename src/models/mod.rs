pub mod billing;
pub mod diversion;
pub mod dosing;
pub mod enums;
pub mod equity;
pub mod facility;
pub mod filters;
pub mod insurance;
pub mod lab;
pub mod patient;
pub mod pmp;
pub mod prior_auth;
pub mod staff;
pub mod support;
pub mod vaccination;

pub use billing::*;
pub use diversion::*;
pub use dosing::*;
pub use equity::*;
pub use facility::*;
pub use filters::*;
pub use insurance::*;
pub use lab::*;
pub use patient::*;
pub use pmp::*;
pub use prior_auth::*;
pub use staff::*;
pub use support::*;
pub use vaccination::*;
