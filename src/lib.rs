// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

//! Detects where migration clusters crowd shipping lanes, scores the risk
//! and proposes lane adjustments.
//!
//! The pipeline is: [`clustering`] assigns cluster ids to observations,
//! [`conflict_detection`] pairs clusters with nearby lanes, and
//! [`conflict_stats`] / [`route_suggestion`] consume the resulting
//! [`models::ConflictZone`] records. [`session::AnalysisSession`] keeps the
//! latest results for servers that share them between requests.

pub mod clustering;
pub mod config;
pub mod conflict_detection;
pub mod conflict_stats;
pub mod errors;
pub mod geometry;
pub mod ingest;
pub mod models;
pub mod route_suggestion;
pub mod session;

pub use errors::{ConflictError, ConflictResult};
pub use models::{
    ConflictSummary, ConflictZone, LatLon, Lane, MonthKey, MonthlyConflictStats, Observation,
    RouteSuggestion,
};
pub use session::{AnalysisSession, AnalysisSnapshot};
