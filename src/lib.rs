//! Attendance and marks analytics for AttendEase workspaces.
//!
//! The engine (`calc`, `grade`, `risk`, `report`, `render`) reads through the
//! [`gateway::DataGateway`] trait; `db` provides the SQLite implementation and
//! `ipc` exposes everything to the desktop shell over a JSON line protocol.

pub mod bundle;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod gateway;
pub mod grade;
pub mod ipc;
pub mod model;
pub mod render;
pub mod report;
pub mod risk;

#[cfg(test)]
mod testkit;
