//! Command handlers grouped by console view.

pub(crate) mod accounts;
pub(crate) mod auth;
pub(crate) mod dashboard;
pub(crate) mod export;
pub(crate) mod upload;
