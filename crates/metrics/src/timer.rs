use std::{
    mem,
    time::{
        Duration,
        Instant,
    },
};

use prometheus::{
    Histogram,
    HistogramVec,
};

use crate::{
    get_desc,
    log_distribution,
    log_distribution_with_labels,
    MetricLabel,
};

/// Records the time between construction and drop into a histogram.
pub struct Timer {
    start: Instant,
    histogram: &'static Histogram,
}

impl Timer {
    pub fn new(histogram: &'static Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let elapsed_duration = self.start.elapsed();
        let desc = get_desc(self.histogram);
        tracing::debug!("{elapsed_duration:?} for timer {desc:?}");
        log_distribution(self.histogram, elapsed_duration.as_secs_f64());
    }
}

/// Status timer that defaults to error unless `.finish()` is explicitly called
/// upon success.
pub struct StatusTimer {
    start: Instant,
    histogram: &'static HistogramVec,
    labels: Vec<MetricLabel>,
}

impl StatusTimer {
    pub fn new(histogram: &'static HistogramVec) -> Self {
        Self {
            start: Instant::now(),
            histogram,
            labels: vec![MetricLabel::STATUS_ERROR],
        }
    }

    fn replace_status(&mut self, status: MetricLabel) {
        self.labels.retain(|label| label.key != "status");
        self.labels.push(status);
    }

    /// Finish the timer with status success
    pub fn finish(mut self) -> Duration {
        self.replace_status(MetricLabel::STATUS_SUCCESS);
        self.start.elapsed()
    }

    /// Finish the timer with developer error, e.g. a request rejected before it
    /// was sent because its input was invalid.
    pub fn finish_developer_error(mut self) -> Duration {
        self.replace_status(MetricLabel::STATUS_DEVELOPER_ERROR);
        self.start.elapsed()
    }
}

impl Drop for StatusTimer {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let elapsed_duration = self.start.elapsed();
        let desc = get_desc(self.histogram);
        tracing::debug!("{elapsed_duration:?} for timer {desc:?} {:?}", self.labels);
        let labels = mem::take(&mut self.labels);
        log_distribution_with_labels(self.histogram, elapsed_duration.as_secs_f64(), labels);
    }
}
