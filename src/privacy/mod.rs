//! Privacy suppression of a completed summary.
//!
//! Zone volumes are held to k-anonymity by dropping small counts. Flows get
//! l-diversity through k-core decomposition of each period's pickup/dropoff
//! graph: a flow is published only while both of its endpoints stay connected
//! to enough distinct counterparts.

pub mod decompose;
pub mod suppress;

pub use decompose::{Decomposition, FlowGraph, decompose};
pub use suppress::{suppress, suppress_volumes};
