//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                           │
//! │                Transport      │      ReportSink                │
//! └───────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                     │
//! │  HttpTransport │ LoggingReportSink │ PrometheusReportSink      │
//! │  ReadinessSink │ InMemoryReportCollector │ CompositeReportSink │
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod http;
mod prometheus;
mod report_sink;

pub use http::{HttpTransport, HttpTransportConfig};
pub use self::prometheus::PrometheusReportSink;
pub use report_sink::{
    CompositeReportSink, InMemoryReportCollector, LoggingReportSink, ReadinessSink,
};
