//! Admission control — global bandwidth budget.
//!
//! Every connection reserves its nominal QoS rate for its whole lifetime.
//! A new connection is admitted only if the sum of reserved rates stays
//! at or below the ceiling. Nothing is queued: a connection that does not
//! fit is rejected on the spot.
//!
//! Reservations are returned through [`Admission`], which releases on
//! drop, so every exit path of a handler gives the rate back exactly once.
//!
//! Rates are accounted in whole milli-kB/s so that admit and release are
//! exact: `0.1 + 0.2` fits a `0.3` ceiling, and releases leave no residue.

use std::sync::{Arc, Mutex, MutexGuard};

use bandgate_core::Rate;
use serde::Serialize;

/// Fixed-point accounting unit: 1/1000 kB/s.
const UNITS_PER_KBPS: f64 = 1000.0;

/// `rate` in accounting units. Never 0, so every admission holds budget.
fn units(rate: Rate) -> u64 {
    ((rate.kbps() * UNITS_PER_KBPS).round() as u64).max(1)
}

fn kbps(units: u64) -> f64 {
    units as f64 / UNITS_PER_KBPS
}

#[derive(Debug, Default)]
struct AdmissionState {
    committed: u64,
    active: usize,
    admitted_total: u64,
    rejected_total: u64,
}

/// Point-in-time view of the admission state.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSnapshot {
    pub committed_kbps: f64,
    pub ceiling_kbps: f64,
    pub active: usize,
    pub admitted_total: u64,
    pub rejected_total: u64,
}

#[derive(Debug)]
pub struct AdmissionController {
    ceiling: Rate,
    ceiling_units: u64,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(ceiling: Rate) -> Arc<Self> {
        Arc::new(Self {
            ceiling,
            ceiling_units: units(ceiling),
            state: Mutex::new(AdmissionState::default()),
        })
    }

    pub fn ceiling(&self) -> Rate {
        self.ceiling
    }

    /// Reserve `rate` against the ceiling. Returns `None`, with no state
    /// change, if the reservation would exceed it.
    pub fn try_admit(self: &Arc<Self>, rate: Rate) -> Option<Admission> {
        let requested = units(rate);
        let mut state = self.state();
        if state.committed.saturating_add(requested) > self.ceiling_units {
            state.rejected_total += 1;
            return None;
        }
        state.committed += requested;
        state.active += 1;
        state.admitted_total += 1;
        drop(state);

        Some(Admission {
            controller: Arc::clone(self),
            rate,
            units: requested,
            released: false,
        })
    }

    /// Currently reserved bandwidth, in kB/s.
    pub fn committed(&self) -> f64 {
        kbps(self.state().committed)
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.state();
        AdmissionSnapshot {
            committed_kbps: kbps(state.committed),
            ceiling_kbps: self.ceiling.kbps(),
            active: state.active,
            admitted_total: state.admitted_total,
            rejected_total: state.rejected_total,
        }
    }

    fn release(&self, units: u64) {
        let mut state = self.state();
        state.active = state.active.saturating_sub(1);
        state.committed = state.committed.saturating_sub(units);
    }

    fn state(&self) -> MutexGuard<'_, AdmissionState> {
        // The state is plain counters, still coherent after a panic elsewhere.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A granted reservation. Releases its rate when dropped.
#[derive(Debug)]
pub struct Admission {
    controller: Arc<AdmissionController>,
    rate: Rate,
    units: u64,
    released: bool,
}

impl Admission {
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Give the reservation back now rather than at end of scope.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.controller.release(self.units);
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.release_once();
    }
}
