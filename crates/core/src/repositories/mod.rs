//! Record repositories.
//!
//! Each repository owns one kind of record and shares the same [`RecordStore`](crate::store::RecordStore):
//! - [`persons`]: identity records and the [`PersonDirectory`](persons::PersonDirectory) lookup
//! - [`services`]: the check-post service catalog
//! - [`encounters`]: per-service encounters opened under a visit
//! - [`visits`]: the visit lifecycle that ties the other three together

pub mod encounters;
pub mod persons;
pub mod services;
pub mod visits;
