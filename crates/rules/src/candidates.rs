//! Ordered carrier candidate list and its set operations.

use serde::{Deserialize, Serialize};

use forgeship_core::CarrierId;

/// Ordered, duplicate-free list of carrier ids.
///
/// Order is the preference order shown to the buyer (first = default carrier).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateList(Vec<CarrierId>);

impl CandidateList {
    pub fn new(ids: impl IntoIterator<Item = CarrierId>) -> Self {
        let mut list = Self(Vec::new());
        list.add(ids);
        list
    }

    pub fn as_slice(&self) -> &[CarrierId] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<CarrierId> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: CarrierId) -> bool {
        self.0.contains(&id)
    }

    /// Intersect: keep only the given ids, in the current order.
    pub fn allow(&mut self, ids: &[CarrierId]) {
        self.0.retain(|id| ids.contains(id));
    }

    /// Union: append ids not yet present, in the given order.
    pub fn add(&mut self, ids: impl IntoIterator<Item = CarrierId>) {
        for id in ids {
            if !self.0.contains(&id) {
                self.0.push(id);
            }
        }
    }

    /// Subtract the given ids.
    pub fn deny(&mut self, ids: &[CarrierId]) {
        self.0.retain(|id| !ids.contains(id));
    }

    /// Move the given ids (those present) to the front in the given order; the
    /// rest keep their relative order. Nothing is added or dropped.
    pub fn prefer(&mut self, ids: &[CarrierId]) {
        let mut front: Vec<CarrierId> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.0.contains(id) && !front.contains(id) {
                front.push(*id);
            }
        }
        if front.is_empty() {
            return;
        }

        let rest = self.0.iter().copied().filter(|id| !front.contains(id));
        let reordered: Vec<CarrierId> = front.iter().copied().chain(rest).collect();
        self.0 = reordered;
    }
}

impl FromIterator<CarrierId> for CandidateList {
    fn from_iter<I: IntoIterator<Item = CarrierId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<CarrierId>> for CandidateList {
    fn from(value: Vec<CarrierId>) -> Self {
        Self::new(value)
    }
}
