mod common;

pub mod data;
pub mod errors;
pub mod filename;
pub mod model;
pub mod results;

pub use common::parse_civil_timestamp;
pub use data::DataReader;
pub use errors::{ParserError, RowSkip};
pub use filename::{minute_filename, parse_data_filename, seconds_filename, DataFileName};
pub use model::{DataRow, ResultRow, ResultsFile};
pub use results::parse_results;
