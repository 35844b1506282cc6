//! Response data model for visualization data sources.
//!
//! A response is a forest of [`Datum`] trees whose property keys and string
//! values are deduplicated through one [`StringTable`]. Data sources build
//! their series through a shared [`ResponseAssembler`], one
//! [`DatumBuilder`] per node, describing each change as a [`PropertyUpdate`].

pub mod builder;
pub mod data;
pub mod datum;
pub mod error;
mod pretty;
pub mod response;
pub mod string_table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod value;

pub use builder::{DatumBuilder, PendingValue, PropertyUpdate, PropertyWriter};
pub use data::{Data, DataRequest, DataSeries, DataSeriesRequest, Filters};
pub use datum::Datum;
pub use error::{ErrorKind, ResponseError, VizError};
pub use response::ResponseAssembler;
pub use string_table::StringTable;
pub use value::{Timestamp, Value, ValueTag};
