//! Publication sinks for the filtered advisory stream.
//!
//! Every sink is a pure projection of the filtered records plus, for the
//! table sink, its own persisted prior state. Sinks never mutate the
//! semantic fields of a record and never fail the run; a sink that cannot
//! write logs the error at the call site and the remaining sinks still run.

pub mod filtered;
pub mod html;
pub mod rss;
pub mod table;
