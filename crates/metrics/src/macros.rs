pub use paste::paste;
pub use prometheus;

/// Register a histogram with the schema editor metrics registry and store
/// in a static variable.
/// An optional third argument allows specifying labels for this metric.
/// The reported metric name will be the lower_snake_case version of the
/// declared variable name.
#[macro_export]
macro_rules! register_schema_editor_histogram {
    ($VIS:vis $NAME:ident, $HELP:literal $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::Histogram> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    let name = $crate::metric_name!(stringify!([<$NAME:lower>]));
                }
                let help = $crate::metric_help!($HELP);
                $crate::prometheus::register_histogram_with_registry!(
                    &*name,
                    &*help,
                    $crate::SCHEMA_EDITOR_METRICS_REGISTRY,
                )
                .expect("Metric initialization failed")
            });
    };
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::HistogramVec> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    let name = $crate::metric_name!(stringify!([<$NAME:lower>]));
                }
                let help = $crate::metric_help!($HELP);
                $crate::prometheus::register_histogram_vec_with_registry!(
                    &*name,
                    &*help,
                    $LABELS,
                    $crate::SCHEMA_EDITOR_METRICS_REGISTRY,
                )
                .expect("Metric initialization failed")
            });
    };
}

/// Register an integer counter with the schema editor metrics registry and
/// store in a static variable.
/// An optional third argument allows specifying labels for this metric.
/// The reported metric name will be the lower_snake_case version of the
/// declared variable name.
#[macro_export]
macro_rules! register_schema_editor_counter {
    ($VIS:vis $NAME:ident, $HELP:literal $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounter> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    let name = $crate::metric_name!(stringify!([<$NAME:lower>]));
                }
                let help = $crate::metric_help!($HELP);
                $crate::prometheus::register_int_counter_with_registry!(
                    &*name,
                    &*help,
                    $crate::SCHEMA_EDITOR_METRICS_REGISTRY,
                )
                .expect("Metric initialization failed")
            });
    };
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr $(,)?) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounterVec> =
            std::sync::LazyLock::new(|| {
                $crate::paste! {
                    let name = $crate::metric_name!(stringify!([<$NAME:lower>]));
                }
                let help = $crate::metric_help!($HELP);
                $crate::prometheus::register_int_counter_vec_with_registry!(
                    &*name,
                    &*help,
                    $LABELS,
                    $crate::SCHEMA_EDITOR_METRICS_REGISTRY,
                )
                .expect("Metric initialization failed")
            });
    };
}
