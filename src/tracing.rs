//! Structured logging bootstrap, feature-gated exactly like the teacher's own
//! tracing module (`tako-tracing` there, `skein-tracing` here).

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Installs a global `tracing` subscriber with file/line/level annotations.
///
/// Intended to be called once, from the binary embedding this crate, before
/// [`crate::server::serve`] starts accepting connections.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
}
