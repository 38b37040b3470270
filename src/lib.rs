//! COVID-19 surveillance dashboard core: dataset families are normalized
//! once, indexed by dimension, and queried by date range and selections.

pub mod chart;
pub mod config;
pub mod data;

pub use chart::{render_chart, Chart, ChartKind, ChartRequest, DateWindow, Series};
pub use config::DashboardConfig;
pub use data::error::{DataError, Result};
pub use data::filter::FilterSpec;
pub use data::model::{Dimension, FamilyId, Metric, NormalizedDataset, NormalizedRow};
pub use data::registry::DatasetRegistry;
