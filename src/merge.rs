use crate::metric::{MetricValue, Summary};

/// Folds `value` into `acc`.
///
/// Counts add, summaries combine their distributions, and everything else
/// keeps the latest value.
pub fn merge(acc: &mut MetricValue, value: &MetricValue) {
    match (acc, value) {
        (MetricValue::Count(acc), MetricValue::Count(value)) => *acc += *value,
        (MetricValue::Summary(acc), MetricValue::Summary(value)) => acc.merge(value),
        (acc, value) => *acc = *value,
    }
}

impl Summary {
    pub fn merge(&mut self, other: &Summary) {
        self.count = self.count.saturating_add(other.count);
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}
