pub mod error;
pub use error::CoreError;

pub mod metric;
pub use metric::{Counter, Gauge, Histogram};

pub mod registry;
pub use registry::MetricsRegistry;

pub mod source;
pub use source::{MetricsSource, Record};

pub mod taxonomy;
pub use taxonomy::{StaticTaxonomy, Taxonomy, TaxonomyEntry};
