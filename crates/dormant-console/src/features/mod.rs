//! Per-view controllers.
//!
//! Each view owns a [`crate::ViewScope`] and reports failures through the
//! shared [`crate::ToastBus`]; none of them render anything.

pub mod accounts;
pub mod dashboard;
pub mod login;
pub mod reports;
pub mod upload;
