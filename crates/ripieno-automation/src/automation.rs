//! Automation timeline of one port.

use crate::acceleration::Acceleration;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use ripieno_core::{ParameterRange, Persist};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Accelerations for the port named `specifier` on input line `line`.
///
/// Points are kept sorted by `x` in a copy-on-write snapshot, so lookups on
/// the render thread never wait for an editor.
#[derive(Debug)]
pub struct Automation {
    specifier: String,
    line: usize,
    range: ParameterRange,
    accelerations: ArcSwap<Vec<Acceleration>>,
}

impl Automation {
    pub fn new(specifier: impl Into<String>, line: usize, range: ParameterRange) -> Self {
        Self {
            specifier: specifier.into(),
            line,
            range,
            accelerations: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn range(&self) -> &ParameterRange {
        &self.range
    }

    pub fn default_value(&self) -> f64 {
        self.range.default
    }

    pub fn snapshot(&self) -> Arc<Vec<Acceleration>> {
        self.accelerations.load_full()
    }

    pub fn len(&self) -> usize {
        self.accelerations.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accelerations.load().is_empty()
    }

    /// Insert keeping `x` order. A point at the same `x` is replaced and `y`
    /// is clamped to the automation's range.
    pub fn add_acceleration(&self, acceleration: Acceleration) -> Result<()> {
        if !acceleration.x.is_finite() || !acceleration.y.is_finite() {
            return Err(Error::InvalidAcceleration {
                x: acceleration.x,
                y: acceleration.y,
            });
        }
        let acceleration = Acceleration {
            y: self.range.clamp(acceleration.y),
            ..acceleration
        };
        self.accelerations.rcu(|current| {
            let mut accelerations = Vec::clone(current);
            match accelerations.binary_search_by(|a| a.cmp_x(&acceleration)) {
                Ok(i) => accelerations[i] = acceleration,
                Err(i) => accelerations.insert(i, acceleration),
            }
            accelerations
        });
        Ok(())
    }

    /// Returns whether a point at `x` existed.
    pub fn remove_acceleration_at(&self, x: f64) -> bool {
        let mut removed = false;
        self.accelerations.rcu(|current| {
            let mut accelerations = Vec::clone(current);
            let position = accelerations.iter().position(|a| a.x == x);
            removed = position.is_some();
            if let Some(i) = position {
                accelerations.remove(i);
            }
            accelerations
        });
        removed
    }

    pub fn find_point(&self, x: f64) -> Option<Acceleration> {
        self.accelerations
            .load()
            .iter()
            .find(|a| a.x == x)
            .copied()
    }

    /// Points with `x` in `[x0, x1)`.
    pub fn find_region(&self, x0: f64, x1: f64) -> Vec<Acceleration> {
        self.accelerations
            .load()
            .iter()
            .filter(|a| a.x >= x0 && a.x < x1)
            .copied()
            .collect()
    }

    pub fn select_region(&self, x0: f64, x1: f64) {
        self.update_selection(|a| (a.x >= x0 && a.x < x1).then_some(true));
    }

    pub fn free_selection(&self) {
        self.update_selection(|_| Some(false));
    }

    pub fn selection(&self) -> Vec<Acceleration> {
        self.accelerations
            .load()
            .iter()
            .filter(|a| a.selected)
            .copied()
            .collect()
    }

    fn update_selection(&self, mut select: impl FnMut(&Acceleration) -> Option<bool>) {
        self.accelerations.rcu(|current| {
            let mut accelerations = Vec::clone(current);
            for acceleration in accelerations.iter_mut() {
                if let Some(selected) = select(acceleration) {
                    acceleration.selected = selected;
                }
            }
            accelerations
        });
    }

    /// Point governing the window `[x, x_end)`.
    ///
    /// The latest point with `x <= point.x < x_end` wins, provided at least
    /// one point starts inside the window. Otherwise, with
    /// `use_prev_on_failure`, the last point before `x`; else `None`.
    pub fn get_value(&self, x: f64, x_end: f64, use_prev_on_failure: bool) -> Option<Acceleration> {
        let accelerations = self.accelerations.load();
        let start = accelerations.partition_point(|a| a.x < x);
        match accelerations.get(start) {
            Some(first) if first.x < x_end => {
                let end = accelerations.partition_point(|a| a.x < x_end);
                accelerations.get(end - 1).copied()
            }
            _ if use_prev_on_failure => start.checked_sub(1).map(|i| accelerations[i]),
            _ => None,
        }
    }
}

impl Clone for Automation {
    fn clone(&self) -> Self {
        Self {
            specifier: self.specifier.clone(),
            line: self.line,
            range: self.range,
            accelerations: ArcSwap::new(self.accelerations.load_full()),
        }
    }
}

/// Serialized form of an [`Automation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDocument {
    pub specifier: String,
    pub line: usize,
    pub range: ParameterRange,
    pub accelerations: Vec<Acceleration>,
}

impl Persist for Automation {
    type Document = AutomationDocument;

    fn to_document(&self) -> AutomationDocument {
        AutomationDocument {
            specifier: self.specifier.clone(),
            line: self.line,
            range: self.range,
            accelerations: self.snapshot().as_ref().clone(),
        }
    }

    fn from_document(document: AutomationDocument) -> ripieno_core::Result<Self> {
        let mut accelerations = document.accelerations;
        accelerations.retain(|a| a.x.is_finite() && a.y.is_finite());
        accelerations.sort_by(Acceleration::cmp_x);
        accelerations.dedup_by(|a, b| a.x == b.x);
        Ok(Self {
            specifier: document.specifier,
            line: document.line,
            range: document.range,
            accelerations: ArcSwap::from_pointee(accelerations),
        })
    }
}
