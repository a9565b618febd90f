//! External force sources and the registry that sums them.
//!
//! Every source is resolved to a length-N contribution when it is applied.
//! The registry keeps the running sum (`net_force`) up to date by
//! subtracting an identifier's old contribution and adding its new one.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};
use wv_core::{Real, ensure_all_finite, ensure_finite, ensure_len};

use crate::error::{SimError, SimResult};

/// Identifier of a force contribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForceId(String);

impl ForceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ForceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ForceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ForceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ForceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A concrete force sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ForceValue {
    /// Same value at every point.
    Uniform(Real),
    /// One value per point; length must equal N.
    Vector(Vec<Real>),
}

impl From<Real> for ForceValue {
    fn from(value: Real) -> Self {
        Self::Uniform(value)
    }
}

impl From<Vec<Real>> for ForceValue {
    fn from(values: Vec<Real>) -> Self {
        Self::Vector(values)
    }
}

/// Stateful force source advanced once per tick.
///
/// Returning `None` ends the source; the registry then drops it.
pub trait ForceGenerator: Send {
    fn advance(&mut self) -> Option<ForceValue>;
}

pub type ForceCallback = Box<dyn FnMut() -> Option<ForceValue> + Send>;

/// Anything that can be registered under a [`ForceId`].
pub enum Force {
    Uniform(Real),
    Vector(Vec<Real>),
    /// Re-invoked every tick; `None` removes it.
    Callback(ForceCallback),
    Generator(Box<dyn ForceGenerator>),
}

impl Force {
    pub fn callback(f: impl FnMut() -> Option<ForceValue> + Send + 'static) -> Self {
        Self::Callback(Box::new(f))
    }

    pub fn generator(g: impl ForceGenerator + 'static) -> Self {
        Self::Generator(Box::new(g))
    }
}

impl From<Real> for Force {
    fn from(value: Real) -> Self {
        Self::Uniform(value)
    }
}

impl From<Vec<Real>> for Force {
    fn from(values: Vec<Real>) -> Self {
        Self::Vector(values)
    }
}

impl From<ForceValue> for Force {
    fn from(value: ForceValue) -> Self {
        match value {
            ForceValue::Uniform(v) => Self::Uniform(v),
            ForceValue::Vector(v) => Self::Vector(v),
        }
    }
}

impl fmt::Debug for Force {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(v) => f.debug_tuple("Uniform").field(v).finish(),
            Self::Vector(v) => f.debug_tuple("Vector").field(&v.len()).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

enum Source {
    Static,
    Callback(ForceCallback),
    Generator(Box<dyn ForceGenerator>),
}

impl Source {
    fn is_dynamic(&self) -> bool {
        !matches!(self, Source::Static)
    }
}

struct Entry {
    source: Source,
    values: Vec<Real>,
}

/// Outcome of one [`ForceRegistry::update_forces`] pass.
#[derive(Debug, Default)]
pub struct ForceUpdate {
    /// Dynamic sources invoked this pass.
    pub advanced: usize,
    /// Sources that signalled termination and were removed.
    pub expired: Vec<ForceId>,
    /// Sources whose output failed validation and were removed.
    pub rejected: Vec<(ForceId, SimError)>,
}

/// Owns every registered force and their running sum.
pub struct ForceRegistry {
    n: usize,
    entries: BTreeMap<ForceId, Entry>,
    net_force: Vec<Real>,
}

impl ForceRegistry {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: BTreeMap::new(),
            net_force: vec![0.0; n],
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Elementwise sum of all live contributions.
    pub fn net_force(&self) -> &[Real] {
        &self.net_force
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ForceId> {
        self.entries.keys()
    }

    pub fn is_force_applied(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Current resolved contribution of `id`.
    pub fn contribution(&self, id: &str) -> Option<&[Real]> {
        self.entries.get(id).map(|e| e.values.as_slice())
    }

    /// Register, replace or (with `None`) clear the contribution under `id`.
    ///
    /// Callbacks and generators are invoked once immediately; a source that
    /// yields nothing is not registered. Returns whether `id` now holds a
    /// contribution. Invalid values are rejected and leave the registry
    /// untouched.
    pub fn apply_force(&mut self, id: impl Into<ForceId>, force: Option<Force>) -> SimResult<bool> {
        let id = id.into();
        let Some(force) = force else {
            self.remove(&id);
            return Ok(false);
        };

        let (source, value) = match force {
            Force::Uniform(v) => (Source::Static, Some(ForceValue::Uniform(v))),
            Force::Vector(v) => (Source::Static, Some(ForceValue::Vector(v))),
            Force::Callback(mut f) => {
                let value = f();
                (Source::Callback(f), value)
            }
            Force::Generator(mut g) => {
                let value = g.advance();
                (Source::Generator(g), value)
            }
        };

        let Some(value) = value else {
            self.remove(&id);
            return Ok(false);
        };
        let values = self.resolve(value)?;

        if let Some(old) = self.entries.remove(&id) {
            accumulate(&mut self.net_force, &old.values, -1.0);
        }
        accumulate(&mut self.net_force, &values, 1.0);
        debug!(id = %id, dynamic = source.is_dynamic(), "force applied");
        self.entries.insert(id, Entry { source, values });
        Ok(true)
    }

    /// Advance every callback/generator and fold its new value into the sum.
    pub fn update_forces(&mut self) -> ForceUpdate {
        let mut report = ForceUpdate::default();
        let dynamic: Vec<ForceId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.source.is_dynamic())
            .map(|(id, _)| id.clone())
            .collect();

        for id in dynamic {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let produced = match &mut entry.source {
                Source::Callback(f) => f(),
                Source::Generator(g) => g.advance(),
                Source::Static => continue,
            };
            report.advanced += 1;

            let Some(value) = produced else {
                self.remove(&id);
                debug!(id = %id, "force source expired");
                report.expired.push(id);
                continue;
            };
            match self.resolve(value) {
                Ok(values) => self.replace_values(&id, values),
                Err(e) => {
                    warn!(id = %id, error = %e, "force source produced invalid output; removed");
                    self.remove(&id);
                    report.rejected.push((id, e));
                }
            }
        }
        report
    }

    /// Rebuild `net_force` from scratch by summing every entry.
    pub fn recalculate_net_force(&mut self) {
        self.net_force.fill(0.0);
        for entry in self.entries.values() {
            accumulate(&mut self.net_force, &entry.values, 1.0);
        }
    }

    /// Drop every entry and zero the sum.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.net_force.fill(0.0);
    }

    /// Change the point count; all entries are dropped.
    pub fn resize(&mut self, n: usize) {
        self.n = n;
        self.entries.clear();
        self.net_force = vec![0.0; n];
    }

    fn resolve(&self, value: ForceValue) -> SimResult<Vec<Real>> {
        match value {
            ForceValue::Uniform(v) => {
                ensure_finite(v, "force")?;
                Ok(vec![v; self.n])
            }
            ForceValue::Vector(values) => {
                ensure_len(&values, self.n, "force")?;
                ensure_all_finite(&values, "force")?;
                Ok(values)
            }
        }
    }

    fn replace_values(&mut self, id: &ForceId, values: Vec<Real>) {
        if let Some(entry) = self.entries.get_mut(id) {
            accumulate(&mut self.net_force, &entry.values, -1.0);
            accumulate(&mut self.net_force, &values, 1.0);
            entry.values = values;
        }
    }

    fn remove(&mut self, id: &ForceId) {
        if let Some(old) = self.entries.remove(id) {
            accumulate(&mut self.net_force, &old.values, -1.0);
        }
    }
}

impl fmt::Debug for ForceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceRegistry")
            .field("n", &self.n)
            .field("ids", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

// Zero entries are skipped.
fn accumulate(net: &mut [Real], values: &[Real], sign: Real) {
    for (acc, &v) in net.iter_mut().zip(values) {
        if v != 0.0 {
            *acc += sign * v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Countdown {
        left: usize,
    }

    impl ForceGenerator for Countdown {
        fn advance(&mut self) -> Option<ForceValue> {
            if self.left == 0 {
                return None;
            }
            self.left -= 1;
            Some(ForceValue::Uniform(self.left as Real + 1.0))
        }
    }

    #[test]
    fn uniform_is_broadcast() {
        let mut reg = ForceRegistry::new(5);
        assert!(reg.apply_force("test", Some(Force::Uniform(1.0))).unwrap());
        assert_eq!(reg.net_force(), &[1.0; 5]);
        assert!(reg.is_force_applied("test"));
    }

    #[test]
    fn clearing_restores_previous_sum() {
        let mut reg = ForceRegistry::new(4);
        reg.apply_force("a", Some(vec![1.0, 2.0, 3.0, 4.0].into()))
            .unwrap();
        reg.apply_force("b", Some(Force::Uniform(0.5))).unwrap();
        assert_eq!(reg.net_force(), &[1.5, 2.5, 3.5, 4.5]);

        assert!(!reg.apply_force("b", None).unwrap());
        assert_eq!(reg.net_force(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(!reg.is_force_applied("b"));
    }

    #[test]
    fn reapplying_replaces_contribution() {
        let mut reg = ForceRegistry::new(3);
        reg.apply_force("a", Some(Force::Uniform(2.0))).unwrap();
        reg.apply_force("a", Some(vec![0.0, 1.0, 0.0].into()))
            .unwrap();
        assert_eq!(reg.net_force(), &[0.0, 1.0, 0.0]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn wrong_length_rejected_without_side_effects() {
        let mut reg = ForceRegistry::new(4);
        reg.apply_force("a", Some(Force::Uniform(1.0))).unwrap();
        let err = reg
            .apply_force("a", Some(vec![1.0, 2.0].into()))
            .unwrap_err();
        assert_eq!(
            err,
            SimError::LengthMismatch {
                what: "force",
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(reg.net_force(), &[1.0; 4]);
        assert_eq!(reg.contribution("a"), Some(&[1.0; 4][..]));
    }

    #[test]
    fn non_finite_rejected() {
        let mut reg = ForceRegistry::new(3);
        assert!(matches!(
            reg.apply_force("nan", Some(Force::Uniform(f64::NAN))),
            Err(SimError::NonFinite { .. })
        ));
        assert!(matches!(
            reg.apply_force("inf", Some(vec![0.0, f64::INFINITY, 0.0].into())),
            Err(SimError::NonFinite { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn generator_advances_until_exhausted() {
        let mut reg = ForceRegistry::new(3);
        // first value consumed at registration
        assert!(
            reg.apply_force("gen", Some(Force::generator(Countdown { left: 3 })))
                .unwrap()
        );
        assert_eq!(reg.net_force(), &[3.0; 3]);

        let update = reg.update_forces();
        assert_eq!(update.advanced, 1);
        assert_eq!(reg.net_force(), &[2.0; 3]);

        reg.update_forces();
        assert_eq!(reg.net_force(), &[1.0; 3]);

        let update = reg.update_forces();
        assert_eq!(update.expired, vec![ForceId::from("gen")]);
        assert_eq!(reg.net_force(), &[0.0; 3]);
        assert!(!reg.is_force_applied("gen"));
    }

    #[test]
    fn exhausted_generator_is_not_registered() {
        let mut reg = ForceRegistry::new(3);
        let applied = reg
            .apply_force("gen", Some(Force::generator(Countdown { left: 0 })))
            .unwrap();
        assert!(!applied);
        assert!(reg.is_empty());
    }

    #[test]
    fn callback_is_polled_each_update() {
        let mut reg = ForceRegistry::new(3);
        let mut calls = 0.0;
        reg.apply_force(
            "cb",
            Some(Force::callback(move || {
                calls += 1.0;
                Some(ForceValue::Uniform(calls))
            })),
        )
        .unwrap();
        reg.apply_force("static", Some(Force::Uniform(10.0))).unwrap();
        assert_eq!(reg.net_force(), &[11.0; 3]);

        let update = reg.update_forces();
        assert_eq!(update.advanced, 1);
        assert_eq!(reg.net_force(), &[12.0; 3]);
    }

    #[test]
    fn invalid_dynamic_output_removed() {
        let mut reg = ForceRegistry::new(3);
        let mut first = true;
        reg.apply_force(
            "bad",
            Some(Force::callback(move || {
                if first {
                    first = false;
                    Some(ForceValue::Uniform(1.0))
                } else {
                    Some(ForceValue::Vector(vec![1.0]))
                }
            })),
        )
        .unwrap();
        let update = reg.update_forces();
        assert_eq!(update.rejected.len(), 1);
        assert!(reg.is_empty());
        assert_eq!(reg.net_force(), &[0.0; 3]);
    }

    #[test]
    fn recalculate_matches_incremental() {
        let mut reg = ForceRegistry::new(3);
        reg.apply_force("a", Some(vec![0.1, 0.2, 0.3].into()))
            .unwrap();
        reg.apply_force("b", Some(Force::Uniform(0.7))).unwrap();
        reg.apply_force("a", Some(vec![0.0, 5.0, 0.0].into()))
            .unwrap();
        let incremental = reg.net_force().to_vec();
        reg.recalculate_net_force();
        for (a, b) in incremental.iter().zip(reg.net_force()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn resize_drops_entries() {
        let mut reg = ForceRegistry::new(3);
        reg.apply_force("a", Some(Force::Uniform(1.0))).unwrap();
        reg.resize(6);
        assert!(reg.is_empty());
        assert_eq!(reg.net_force(), &[0.0; 6]);
    }
}
