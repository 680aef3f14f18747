//! A scheduler thread with cooperative pause/resume and shutdown, both
//! observed only at tick boundaries.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use super::sink::TickSink;
use super::Simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Paused,
    Stopping,
}

struct RunControl {
    state: Mutex<RunState>,
    condvar: Condvar,
}

/// Owns the simulation on a dedicated thread. A paused simulation blocks
/// the thread on the condition variable until resumed; shutdown completes
/// the current tick and then stops gracefully.
pub struct SimulationRunner {
    control: Arc<RunControl>,
    handle: Option<JoinHandle<Simulation>>,
}

impl SimulationRunner {
    /// Start ticking immediately. With `max_ticks` the run stops by itself;
    /// otherwise it runs until `shutdown`.
    pub fn spawn(mut sim: Simulation, mut sink: Box<dyn TickSink>, max_ticks: Option<u64>) -> Self {
        let control = Arc::new(RunControl {
            state: Mutex::new(RunState::Running),
            condvar: Condvar::new(),
        });
        let thread_control = control.clone();
        let handle = std::thread::spawn(move || {
            info!("simulation started");
            let mut remaining = max_ticks;
            loop {
                {
                    let mut state = thread_control.state.lock().unwrap();
                    while *state == RunState::Paused {
                        state = thread_control.condvar.wait(state).unwrap();
                    }
                    if *state == RunState::Stopping {
                        break;
                    }
                }
                if let Some(n) = &mut remaining {
                    if *n == 0 {
                        break;
                    }
                    *n -= 1;
                }
                let snapshot = sim.tick();
                if let Err(err) = sink.send(snapshot) {
                    warn!(%err, "tick sink failed, stopping");
                    break;
                }
            }
            sink.close();
            info!(tick = sim.current_tick(), "simulation stopped");
            sim
        });
        Self {
            control,
            handle: Some(handle),
        }
    }

    fn set_state(&self, new: RunState) {
        let mut state = self.control.state.lock().unwrap();
        if *state != RunState::Stopping {
            *state = new;
        }
        self.control.condvar.notify_all();
    }

    pub fn pause(&self) {
        self.set_state(RunState::Paused);
    }

    pub fn resume(&self) {
        self.set_state(RunState::Running);
    }

    /// Request a graceful stop and hand the simulation back.
    pub fn shutdown(mut self) -> Simulation {
        {
            let mut state = self.control.state.lock().unwrap();
            *state = RunState::Stopping;
        }
        self.control.condvar.notify_all();
        self.handle
            .take()
            .expect("runner joined once")
            .join()
            .expect("simulation thread panicked")
    }
}
