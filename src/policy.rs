use crate::metric::Metric;

pub type Trigger = Box<dyn Fn(&Metric) -> bool + Send>;

/// When to flush ahead of the harvest deadline.
///
/// Only one rule is active at a time. Every flush, whatever caused it,
/// restarts the record count used by [`FlushPolicy::Threshold`].
#[derive(Default)]
pub enum FlushPolicy {
    /// Flush on the deadline only.
    #[default]
    Interval,
    /// Flush right after recording a metric the predicate accepts.
    Predicate(Trigger),
    /// Flush once this many records arrived since the last flush.
    Threshold(usize),
}
impl FlushPolicy {
    pub fn predicate(trip: impl Fn(&Metric) -> bool + Send + 'static) -> Self {
        Self::Predicate(Box::new(trip))
    }

    /// Flush after any metric whose name starts with one of `prefixes`.
    ///
    /// Meant for names that mark a finished unit of work, where the process
    /// may exit before the next deadline.
    pub fn name_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::predicate(move |metric| prefixes.iter().any(|p| metric.name.starts_with(p)))
    }

    pub fn threshold(records: usize) -> Self {
        Self::Threshold(records.max(1))
    }

    pub(crate) fn should_flush(&self, metric: &Metric, records_since_flush: usize) -> bool {
        match self {
            FlushPolicy::Interval => false,
            FlushPolicy::Predicate(trip) => trip(metric),
            FlushPolicy::Threshold(records) => records_since_flush >= *records,
        }
    }
}
impl core::fmt::Debug for FlushPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FlushPolicy::Interval => f.write_str("Interval"),
            FlushPolicy::Predicate(_) => f.write_str("Predicate"),
            FlushPolicy::Threshold(records) => f.debug_tuple("Threshold").field(records).finish(),
        }
    }
}
