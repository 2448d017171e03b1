//! Test computers for driving the pool deterministically.

#![allow(dead_code)]

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use tilewonder_compute::{MandelbrotComputer, TileComputer};
use tilewonder_core::{TileBuffer, TileRequest};

/// Iteration budget that makes `PanickingComputer` panic.
pub const POISON_ITERATIONS: u32 = 13;

/// Blocks every computation until `open` is called, then behaves like
/// `MandelbrotComputer`. Signals on `entered` each time a computation starts and
/// records `(min_x, scale)` once it proceeds.
#[derive(Clone)]
pub struct GatedComputer {
    gate: Arc<(Mutex<bool>, Condvar)>,
    entered: Sender<()>,
    calls: Arc<Mutex<Vec<(f64, u32)>>>,
}

impl GatedComputer {
    pub fn new() -> (Self, Receiver<()>) {
        let (entered_tx, entered_rx) = channel();
        let computer = Self {
            gate: Arc::new((Mutex::new(false), Condvar::new())),
            entered: entered_tx,
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        (computer, entered_rx)
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn calls(&self) -> Vec<(f64, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TileComputer for GatedComputer {
    fn compute(&self, request: &TileRequest, scale: u32) -> TileBuffer {
        let _ = self.entered.send(());

        let (lock, cvar) = &*self.gate;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
        drop(open);

        self.calls.lock().unwrap().push((request.min_x, scale));
        MandelbrotComputer.compute(request, scale)
    }
}

/// `MandelbrotComputer` that panics on requests with `POISON_ITERATIONS`.
#[derive(Clone, Copy, Default)]
pub struct PanickingComputer;

impl TileComputer for PanickingComputer {
    fn compute(&self, request: &TileRequest, scale: u32) -> TileBuffer {
        if request.max_iterations == POISON_ITERATIONS {
            panic!("poisoned tile at ({}, {})", request.min_x, request.min_y);
        }
        MandelbrotComputer.compute(request, scale)
    }
}

/// Request tagged by `min_x` so recorded calls can be told apart.
pub fn tagged_request(tag: f64) -> TileRequest {
    TileRequest::new(tag, -0.25, 0.01, 8, 64)
}
