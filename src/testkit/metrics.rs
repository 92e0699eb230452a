//! Recording [`MetricsSink`] for asserting on emitted run metrics.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::outbound::metrics::MetricsSink;

/// One sample received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Histogram { name: String, value: f64 },
    Count { name: String, value: i64 },
}

impl Sample {
    pub fn name(&self) -> &str {
        match self {
            Self::Histogram { name, .. } | Self::Count { name, .. } => name,
        }
    }
}

/// Sink that keeps every sample and can be told to reject some names.
#[derive(Debug, Default)]
pub struct RecordingSink {
    samples: Mutex<Vec<Sample>>,
    rejected: Mutex<HashSet<String>>,
    fail_flush: AtomicBool,
    flushes: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every emission for `name`.
    pub fn reject(&self, name: &str) {
        self.rejected.lock().insert(name.to_string());
    }

    /// Fail every flush.
    pub fn fail_flush(&self) {
        self.fail_flush.store(true, Ordering::SeqCst);
    }

    /// Number of successful flushes.
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().clone()
    }

    /// Value of the counter named `name`, if it was emitted.
    pub fn count(&self, name: &str) -> Option<i64> {
        self.samples.lock().iter().find_map(|s| match s {
            Sample::Count { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }

    fn accept(&self, name: &str, sample: Sample) -> Result<()> {
        if self.rejected.lock().contains(name) {
            return Err(Error::Connection(format!("{name} rejected")));
        }
        self.samples.lock().push(sample);
        Ok(())
    }
}

impl MetricsSink for RecordingSink {
    fn histogram(&self, name: &str, value: f64) -> Result<()> {
        self.accept(
            name,
            Sample::Histogram {
                name: name.to_string(),
                value,
            },
        )
    }

    fn count(&self, name: &str, value: i64) -> Result<()> {
        self.accept(
            name,
            Sample::Count {
                name: name.to_string(),
                value,
            },
        )
    }

    fn flush(&self) -> Result<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(Error::Connection("flush rejected".into()));
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
