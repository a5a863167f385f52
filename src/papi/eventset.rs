//! PAPI event sets.

use crate::api::Counter;
use crate::papi::{ffi, Papi};
use crate::util::c_name;
use crate::Result;
use log::{debug, warn};
use nix::libc::{c_int, c_longlong, c_ulong};
use nix::unistd::Pid;
use std::fmt;

/// State flags of an event set, from `PAPI_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventState(c_int);

const STATE_NAMES: [(c_int, &str); 9] = [
    (ffi::PAPI_STOPPED, "STOPPED"),
    (ffi::PAPI_RUNNING, "RUNNING"),
    (ffi::PAPI_PAUSED, "PAUSED"),
    (ffi::PAPI_NOT_INIT, "NOT_INIT"),
    (ffi::PAPI_OVERFLOWING, "OVERFLOWING"),
    (ffi::PAPI_PROFILING, "PROFILING"),
    (ffi::PAPI_MULTIPLEXING, "MULTIPLEXING"),
    (ffi::PAPI_ATTACHED, "ATTACHED"),
    (ffi::PAPI_CPU_ATTACHED, "CPU_ATTACHED"),
];

impl EventState {
    /// Raw `PAPI_state` bits.
    pub fn bits(self) -> c_int {
        self.0
    }

    /// Counters are stopped.
    pub fn is_stopped(self) -> bool {
        self.0 & ffi::PAPI_STOPPED != 0
    }

    /// Counters are counting.
    pub fn is_running(self) -> bool {
        self.0 & ffi::PAPI_RUNNING != 0
    }

    /// The event set is multiplexed.
    pub fn is_multiplexing(self) -> bool {
        self.0 & ffi::PAPI_MULTIPLEXING != 0
    }

    /// The event set is attached to another thread or process.
    pub fn is_attached(self) -> bool {
        self.0 & ffi::PAPI_ATTACHED != 0
    }
}

/// `RUNNING|MULTIPLEXING`
impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = STATE_NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// A PAPI event set.
///
/// The native event set is cleaned up and destroyed when this is dropped. A running set
/// is stopped first.
#[derive(Debug)]
pub struct EventSet<'p> {
    papi: &'p Papi,
    handle: c_int,
}

impl<'p> EventSet<'p> {
    /// Create an event set using the associated builder.
    pub fn build() -> EventSetBuilder {
        EventSetBuilder::default()
    }

    /// Native handle of the event set.
    pub fn handle(&self) -> c_int {
        self.handle
    }

    fn check(&self, call: &'static str, ret: c_int) -> Result<c_int> {
        self.papi.check(call, ret)
    }

    /// Add an event by code.
    pub fn add_event(&self, code: c_int) -> Result<()> {
        self.check("PAPI_add_event", unsafe {
            self.papi.api().PAPI_add_event(self.handle, code)
        })?;
        Ok(())
    }

    /// Add an event by name.
    pub fn add_named_event(&self, name: &str) -> Result<()> {
        let cname = c_name(name)?;
        self.check("PAPI_add_named_event", unsafe {
            self.papi.api().PAPI_add_named_event(self.handle, cname.as_ptr())
        })?;
        Ok(())
    }

    /// Add several events by code, stopping at the first failure.
    pub fn add_events(&self, codes: &[c_int]) -> Result<()> {
        codes.iter().try_for_each(|code| self.add_event(*code))
    }

    /// Remove an event by code.
    pub fn remove_event(&self, code: c_int) -> Result<()> {
        self.check("PAPI_remove_event", unsafe {
            self.papi.api().PAPI_remove_event(self.handle, code)
        })?;
        Ok(())
    }

    /// Remove an event by name.
    pub fn remove_named_event(&self, name: &str) -> Result<()> {
        let cname = c_name(name)?;
        self.check("PAPI_remove_named_event", unsafe {
            self.papi
                .api()
                .PAPI_remove_named_event(self.handle, cname.as_ptr())
        })?;
        Ok(())
    }

    /// Remove several events by code, stopping at the first failure.
    pub fn remove_events(&self, codes: &[c_int]) -> Result<()> {
        codes.iter().try_for_each(|code| self.remove_event(*code))
    }

    /// Remove every event. The set must be stopped.
    pub fn cleanup(&self) -> Result<()> {
        self.check("PAPI_cleanup_eventset", unsafe {
            self.papi.api().PAPI_cleanup_eventset(self.handle)
        })?;
        Ok(())
    }

    /// Bind the event set to a component. Needed before options such as multiplexing can
    /// be set on an empty set.
    pub fn assign_component(&self, cidx: c_int) -> Result<()> {
        self.check("PAPI_assign_eventset_component", unsafe {
            self.papi
                .api()
                .PAPI_assign_eventset_component(self.handle, cidx)
        })?;
        Ok(())
    }

    /// Component the event set is bound to.
    pub fn component(&self) -> Result<c_int> {
        self.check("PAPI_get_eventset_component", unsafe {
            self.papi.api().PAPI_get_eventset_component(self.handle)
        })
    }

    /// Count events of another thread or process.
    pub fn attach(&self, pid: Pid) -> Result<()> {
        self.check("PAPI_attach", unsafe {
            self.papi
                .api()
                .PAPI_attach(self.handle, pid.as_raw() as c_ulong)
        })?;
        Ok(())
    }

    /// Undo `attach`.
    pub fn detach(&self) -> Result<()> {
        self.check("PAPI_detach", unsafe {
            self.papi.api().PAPI_detach(self.handle)
        })?;
        Ok(())
    }

    /// Enable multiplexing. The library must have been built with `multiplex()`.
    pub fn set_multiplex(&self) -> Result<()> {
        self.check("PAPI_set_multiplex", unsafe {
            self.papi.api().PAPI_set_multiplex(self.handle)
        })?;
        Ok(())
    }

    /// Whether the event set is multiplexed.
    pub fn is_multiplexed(&self) -> Result<bool> {
        let ret = self.check("PAPI_get_multiplex", unsafe {
            self.papi.api().PAPI_get_multiplex(self.handle)
        })?;
        Ok(ret > 0)
    }

    /// Number of events in the set.
    pub fn num_events(&self) -> Result<usize> {
        let n = self.check("PAPI_num_events", unsafe {
            self.papi.api().PAPI_num_events(self.handle)
        })?;
        Ok(n as usize)
    }

    /// Codes of the events in the set, in the order they were added.
    pub fn list(&self) -> Result<Vec<c_int>> {
        let mut count = self.num_events()? as c_int;
        let mut codes: Vec<c_int> = vec![0; count as usize];
        self.check("PAPI_list_events", unsafe {
            self.papi
                .api()
                .PAPI_list_events(self.handle, codes.as_mut_ptr(), &mut count)
        })?;
        codes.truncate(count as usize);
        Ok(codes)
    }

    /// Names of the events in the set.
    pub fn names(&self) -> Result<Vec<String>> {
        self.list()?
            .into_iter()
            .map(|code| self.papi.event_code_to_name(code))
            .collect()
    }

    /// Current state.
    pub fn state(&self) -> Result<EventState> {
        let mut status: c_int = 0;
        self.check("PAPI_state", unsafe {
            self.papi.api().PAPI_state(self.handle, &mut status)
        })?;
        Ok(EventState(status))
    }

    /// Start counting.
    pub fn start(&self) -> Result<()> {
        self.check("PAPI_start", unsafe {
            self.papi.api().PAPI_start(self.handle)
        })?;
        Ok(())
    }

    fn values(&self) -> Result<Vec<c_longlong>> {
        Ok(vec![0; self.num_events()?])
    }

    /// Stop counting and return the final counts.
    pub fn stop(&self) -> Result<Vec<i64>> {
        let mut values = self.values()?;
        self.check("PAPI_stop", unsafe {
            self.papi.api().PAPI_stop(self.handle, values.as_mut_ptr())
        })?;
        Ok(values)
    }

    /// Read the counters without stopping them.
    pub fn read(&self) -> Result<Vec<i64>> {
        let mut values = self.values()?;
        self.check("PAPI_read", unsafe {
            self.papi.api().PAPI_read(self.handle, values.as_mut_ptr())
        })?;
        Ok(values)
    }

    /// Read the counters along with the real time cycle count of the read.
    pub fn read_ts(&self) -> Result<(Vec<i64>, i64)> {
        let mut values = self.values()?;
        let mut cycles: c_longlong = 0;
        self.check("PAPI_read_ts", unsafe {
            self.papi
                .api()
                .PAPI_read_ts(self.handle, values.as_mut_ptr(), &mut cycles)
        })?;
        Ok((values, cycles))
    }

    /// Add the counters to `values` and reset them.
    ///
    /// `values` must hold one slot per event.
    pub fn accum(&self, values: &mut [i64]) -> Result<()> {
        self.check_len("PAPI_accum", values.len())?;
        self.check("PAPI_accum", unsafe {
            self.papi.api().PAPI_accum(self.handle, values.as_mut_ptr())
        })?;
        Ok(())
    }

    /// Reset the counters to zero.
    pub fn reset(&self) -> Result<()> {
        self.check("PAPI_reset", unsafe {
            self.papi.api().PAPI_reset(self.handle)
        })?;
        Ok(())
    }

    /// Overwrite the counters, where the hardware allows it.
    pub fn write(&self, values: &[i64]) -> Result<()> {
        self.check_len("PAPI_write", values.len())?;
        let mut values = values.to_vec();
        self.check("PAPI_write", unsafe {
            self.papi.api().PAPI_write(self.handle, values.as_mut_ptr())
        })?;
        Ok(())
    }

    fn check_len(&self, call: &'static str, len: usize) -> Result<()> {
        if len == self.num_events()? {
            Ok(())
        } else {
            Err(crate::Error::Papi {
                call,
                code: crate::PapiError::InvalidArgument,
            })
        }
    }
}

impl<'p> Counter<Vec<i64>> for EventSet<'p> {
    fn enable(&self) -> Result<()> {
        self.start()
    }

    fn disable(&self) -> Result<()> {
        self.stop().map(|_| ())
    }

    fn reset(&self) -> Result<()> {
        EventSet::reset(self)
    }

    fn is_running(&self) -> Result<bool> {
        self.state().map(EventState::is_running)
    }

    fn read_sync(&self) -> Result<Vec<i64>> {
        self.read()
    }
}

impl<'p> Drop for EventSet<'p> {
    fn drop(&mut self) {
        if let Ok(true) = self.state().map(EventState::is_running) {
            if let Err(e) = self.stop() {
                warn!("Could not stop event set {} -- {}", self.handle, e);
            }
        }
        if let Err(e) = self.cleanup() {
            warn!("Could not clean up event set {} -- {}", self.handle, e);
        }
        let ret = unsafe { self.papi.api().PAPI_destroy_eventset(&mut self.handle) };
        match self.papi.check("PAPI_destroy_eventset", ret) {
            Ok(_) => debug!("Destroyed event set"),
            Err(e) => warn!("Could not destroy event set {} -- {}", self.handle, e),
        }
    }
}

/// Helper struct to build an `EventSet`.
#[derive(Debug, Default)]
pub struct EventSetBuilder {
    /// Component to bind to before adding events.
    ///
    /// Defaults to the component of the first event.
    component: Option<c_int>,
    /// Multiplex the counters.
    ///
    /// Defaults to `false`. Implies component 0 when none is given.
    multiplex: bool,
    /// Process or thread to attach to.
    ///
    /// Defaults to the calling thread.
    attach: Option<Pid>,
    /// Events added by name.
    events: Vec<String>,
    /// Events added by code.
    codes: Vec<c_int>,
}

impl EventSetBuilder {
    builder_pattern_some!(
        /// Bind the event set to a component.
        component: c_int
    );

    builder_pattern_bool!(
        /// Multiplex the counters of the event set.
        multiplex
    );

    builder_pattern_some!(
        /// Count events of another process or thread.
        attach: Pid
    );

    /// Add an event by name.
    pub fn event(mut self, name: &str) -> Self {
        self.events.push(name.to_string());
        self
    }

    /// Add an event by code.
    pub fn code(mut self, code: c_int) -> Self {
        self.codes.push(code);
        self
    }

    /// Create the event set.
    pub fn open<'p>(&self, papi: &'p Papi) -> Result<EventSet<'p>> {
        let mut handle = ffi::PAPI_NULL;
        papi.check("PAPI_create_eventset", unsafe {
            papi.api().PAPI_create_eventset(&mut handle)
        })?;
        // From here on the event set is destroyed on error.
        let set = EventSet { papi, handle };

        let component = match (self.component, self.multiplex) {
            (Some(cidx), _) => Some(cidx),
            (None, true) => Some(0),
            (None, false) => None,
        };
        if let Some(cidx) = component {
            set.assign_component(cidx)?;
        }
        if let Some(pid) = self.attach {
            set.attach(pid)?;
        }
        if self.multiplex {
            set.set_multiplex()?;
        }
        for name in &self.events {
            set.add_named_event(name)?;
        }
        set.add_events(&self.codes)?;
        debug!("Created event set {} with {} events", handle, set.num_events()?);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::papi::tests::papi;

    #[test]
    fn test_event_state() {
        let state = EventState(ffi::PAPI_RUNNING | ffi::PAPI_MULTIPLEXING);
        assert!(state.is_running());
        assert!(state.is_multiplexing());
        assert!(!state.is_stopped());
        assert_eq!(format!("{}", state), "RUNNING|MULTIPLEXING");
        assert_eq!(format!("{}", EventState(ffi::PAPI_STOPPED)), "STOPPED");
    }

    #[test]
    fn test_count_events() {
        let papi = match papi() {
            Some(papi) => papi,
            None => return,
        };
        if !papi.query_named_event("PAPI_TOT_CYC").unwrap() {
            return;
        }
        let set = EventSet::build().event("PAPI_TOT_CYC").open(&papi).unwrap();
        assert_eq!(set.num_events().unwrap(), 1);
        assert_eq!(set.names().unwrap(), vec!["PAPI_TOT_CYC".to_string()]);
        assert!(set.state().unwrap().is_stopped());

        set.start().unwrap();
        assert!(set.is_running().unwrap());
        let mut sum = 0u64;
        for i in 0..100_000u64 {
            sum = sum.wrapping_add(i * i);
        }
        assert!(sum > 0);
        let (read, cycles) = set.read_ts().unwrap();
        assert!(cycles > 0);
        let mut acc = vec![0i64];
        set.accum(&mut acc).unwrap();
        assert!(acc[0] >= read[0]);
        assert!(set.accum(&mut [0, 0]).is_err());
        let stopped = set.stop().unwrap();
        assert_eq!(stopped.len(), 1);
        assert!(set.state().unwrap().is_stopped());
    }

    #[test]
    fn test_invalid_event() {
        let papi = match papi() {
            Some(papi) => papi,
            None => return,
        };
        let err = EventSet::build()
            .event("NOT_A_REAL_EVENT")
            .open(&papi)
            .unwrap_err();
        assert!(err.papi_error().is_some());
    }
}
