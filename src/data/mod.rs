/// Data layer: observation types, loading, cleaning and the daily grid.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Vec<Observation>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  cloud threshold + weekly box-plot → CleanedObservation
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ scaffold  │  one row per calendar day, LOESS span
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  DailyTable → CSV
///   └──────────┘
/// ```

pub mod calendar;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod scaffold;
