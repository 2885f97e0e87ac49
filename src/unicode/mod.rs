//! Unicode utilities for line layout: grapheme clusters and display width.

mod grapheme;
mod width;

pub use grapheme::{Cluster, clusters};
pub use width::{WidthMethod, cluster_width};
