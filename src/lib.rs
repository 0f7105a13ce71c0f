//! Attendance, leave and payroll consistency engine for an HR system.
//!
//! The engine is three services over one storage port:
//! [`AttendanceTracker`](service::AttendanceTracker) records daily
//! check-ins, [`LeaveLedger`](service::LeaveLedger) keeps leave requests and
//! the paid-leave balance consistent, and
//! [`PayrollCalculator`](service::PayrollCalculator) /
//! [`BulkPayrollRunner`](service::BulkPayrollRunner) derive monthly salaries
//! from attendance. Storage is any [`HrStore`](store::HrStore); the HTTP
//! boundary lives in [`api`] and [`routes`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;

pub use error::{ErrorKind, HrError, HrResult};
