/// Data layer: family declarations, loading, normalization, domains and queries.
///
/// Architecture:
/// ```text
///   CSV bytes (TableSource)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  skip preamble → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  rename, rewrite labels, parse dates → NormalizedDataset
///   └───────────┘
///        │                      ┌──────────┐
///        ├────────────────────▶ │  domain   │  distinct values per dimension
///        ▼                      └──────────┘
///   ┌──────────┐
///   │  filter   │  date range × accepted values → matching rows
///   └──────────┘
///
///   registry: one lazily loaded NormalizedDataset per FamilyId
/// ```

pub mod dates;
pub mod domain;
pub mod error;
pub mod family;
pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod registry;
