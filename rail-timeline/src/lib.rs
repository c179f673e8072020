//! Train and station schedule reconciliation.
//!
//! Takes raw, noisy, overlapping arrival/departure announcements from a
//! rail-data feed and produces one deduplicated, ordered stop timeline per
//! train, and direction-aware arrival/departure lists per station with
//! delay status and live ETA.
//!
//! Data flows feed -> [`timeline`] (normalize, order, trim) ->
//! [`direction`] -> [`schedule`], with [`store`] holding the results and
//! [`service`] driving refreshes.

pub mod cache;
pub mod config;
pub mod direction;
pub mod domain;
pub mod feed;
pub mod poll;
pub mod schedule;
pub mod service;
pub mod stations;
pub mod store;
pub mod timeline;
pub mod tracker;
