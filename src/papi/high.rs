//! The high level interface of PAPI.
//!
//! Region markers (`PAPI_hl_*`) write their measurements to the files configured through
//! the `PAPI_EVENTS` and `PAPI_OUTPUT_DIRECTORY` environment variables of the library. The
//! rate functions (`PAPI_flips_rate` and friends) keep an implicit event set per thread
//! and report the values accumulated since the previous call.

use crate::papi::{ffi, Papi};
use crate::util::c_name;
use crate::Result;
use log::debug;
use nix::libc::{c_float, c_int, c_longlong};

/// Result of `Papi::flips_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Flips {
    /// Floating point event that was counted.
    pub event: c_int,
    /// Real time since the first call, in seconds.
    pub rtime: f32,
    /// Process time since the first call, in seconds.
    pub ptime: f32,
    /// Floating point instructions since the first call.
    pub flpins: i64,
    /// MFLIPS since the previous call.
    pub mflips: f32,
}

/// Result of `Papi::flops_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Flops {
    /// Floating point event that was counted.
    pub event: c_int,
    /// Real time since the first call, in seconds.
    pub rtime: f32,
    /// Process time since the first call, in seconds.
    pub ptime: f32,
    /// Floating point operations since the first call.
    pub flpops: i64,
    /// MFLOPS since the previous call.
    pub mflops: f32,
}

/// Result of `Papi::ipc`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ipc {
    /// Real time since the first call, in seconds.
    pub rtime: f32,
    /// Process time since the first call, in seconds.
    pub ptime: f32,
    /// Instructions since the first call.
    pub ins: i64,
    /// Instructions per cycle since the previous call.
    pub ipc: f32,
}

/// Result of `Papi::epc`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Epc {
    /// Event that was counted.
    pub event: c_int,
    /// Real time since the first call, in seconds.
    pub rtime: f32,
    /// Process time since the first call, in seconds.
    pub ptime: f32,
    /// Reference cycles since the first call.
    pub reference: i64,
    /// Core cycles since the first call.
    pub core: i64,
    /// Occurrences of `event` since the first call.
    pub evt: i64,
    /// Events per cycle since the previous call.
    pub epc: f32,
}

impl Papi {
    /// Start measuring a named region.
    pub fn hl_region_begin(&self, region: &str) -> Result<()> {
        let cname = c_name(region)?;
        self.check("PAPI_hl_region_begin", unsafe {
            self.api().PAPI_hl_region_begin(cname.as_ptr())
        })?;
        Ok(())
    }

    /// Record an intermediate measurement of a region.
    pub fn hl_read(&self, region: &str) -> Result<()> {
        let cname = c_name(region)?;
        self.check("PAPI_hl_read", unsafe {
            self.api().PAPI_hl_read(cname.as_ptr())
        })?;
        Ok(())
    }

    /// Stop measuring a named region.
    pub fn hl_region_end(&self, region: &str) -> Result<()> {
        let cname = c_name(region)?;
        self.check("PAPI_hl_region_end", unsafe {
            self.api().PAPI_hl_region_end(cname.as_ptr())
        })?;
        Ok(())
    }

    /// Stop the high level counters and write out the report.
    pub fn hl_stop(&self) -> Result<()> {
        self.check("PAPI_hl_stop", unsafe { self.api().PAPI_hl_stop() })?;
        Ok(())
    }

    /// Floating point instruction rate.
    ///
    /// `event` is one of `PAPI_FP_INS`, `PAPI_VEC_SP`, `PAPI_VEC_DP`, `PAPI_FP_OPS`,
    /// `PAPI_SP_OPS` or `PAPI_DP_OPS` (see `ffi`).
    pub fn flips_rate(&self, event: c_int) -> Result<Flips> {
        let (mut rtime, mut ptime, mut mflips): (c_float, c_float, c_float) = (0., 0., 0.);
        let mut flpins: c_longlong = 0;
        self.check("PAPI_flips_rate", unsafe {
            self.api()
                .PAPI_flips_rate(event, &mut rtime, &mut ptime, &mut flpins, &mut mflips)
        })?;
        Ok(Flips {
            event,
            rtime,
            ptime,
            flpins,
            mflips,
        })
    }

    /// Floating point operation rate. Takes the same events as `flips_rate`.
    pub fn flops_rate(&self, event: c_int) -> Result<Flops> {
        let (mut rtime, mut ptime, mut mflops): (c_float, c_float, c_float) = (0., 0., 0.);
        let mut flpops: c_longlong = 0;
        self.check("PAPI_flops_rate", unsafe {
            self.api()
                .PAPI_flops_rate(event, &mut rtime, &mut ptime, &mut flpops, &mut mflops)
        })?;
        Ok(Flops {
            event,
            rtime,
            ptime,
            flpops,
            mflops,
        })
    }

    /// Instructions per cycle.
    pub fn ipc(&self) -> Result<Ipc> {
        let (mut rtime, mut ptime, mut ipc): (c_float, c_float, c_float) = (0., 0., 0.);
        let mut ins: c_longlong = 0;
        self.check("PAPI_ipc", unsafe {
            self.api().PAPI_ipc(&mut rtime, &mut ptime, &mut ins, &mut ipc)
        })?;
        Ok(Ipc {
            rtime,
            ptime,
            ins,
            ipc,
        })
    }

    /// Occurrences of an arbitrary event per cycle.
    ///
    /// An `event` of 0 counts instructions.
    pub fn epc(&self, event: c_int) -> Result<Epc> {
        let (mut rtime, mut ptime, mut epc): (c_float, c_float, c_float) = (0., 0., 0.);
        let (mut reference, mut core, mut evt): (c_longlong, c_longlong, c_longlong) = (0, 0, 0);
        self.check("PAPI_epc", unsafe {
            self.api().PAPI_epc(
                event,
                &mut rtime,
                &mut ptime,
                &mut reference,
                &mut core,
                &mut evt,
                &mut epc,
            )
        })?;
        Ok(Epc {
            event,
            rtime,
            ptime,
            reference,
            core,
            evt,
            epc,
        })
    }

    /// Stop the counters started by the rate functions.
    pub fn rate_stop(&self) -> Result<()> {
        self.check("PAPI_rate_stop", unsafe { self.api().PAPI_rate_stop() })?;
        debug!("Stopped rate counters");
        Ok(())
    }

    /// Run `f` between `flops_rate` calls for `PAPI_FP_OPS`.
    pub fn measure_flops<F, T>(&self, f: F) -> Result<(T, Flops)>
    where
        F: FnOnce() -> T,
    {
        self.flops_rate(ffi::PAPI_FP_OPS)?;
        let out = f();
        let rate = self.flops_rate(ffi::PAPI_FP_OPS);
        self.rate_stop()?;
        Ok((out, rate?))
    }
}

#[cfg(test)]
mod tests {
    use crate::papi::{ffi, tests::papi};
    use crate::Error;

    #[test]
    fn test_region_names() {
        let papi = match papi() {
            Some(papi) => papi,
            None => return,
        };
        match papi.hl_region_begin("bad\0region") {
            Err(Error::InvalidName(name)) => assert_eq!(name, "bad\0region"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ipc() {
        let papi = match papi() {
            Some(papi) => papi,
            None => return,
        };
        // Not every machine exposes the cycle and instruction presets.
        if papi.ipc().is_err() {
            return;
        }
        let mut acc = 0u64;
        for i in 0..50_000u64 {
            acc = acc.wrapping_add(i ^ (i >> 3));
        }
        assert!(acc > 0);
        let rate = papi.ipc().unwrap();
        assert!(rate.ins > 0);
        assert!(rate.rtime >= 0.0);
        papi.rate_stop().unwrap();
    }

    #[test]
    fn test_measure_flops() {
        let papi = match papi() {
            Some(papi) => papi,
            None => return,
        };
        // PAPI_FP_OPS is missing on many machines.
        if papi.flops_rate(ffi::PAPI_FP_OPS).is_err() {
            return;
        }
        papi.rate_stop().unwrap();
        let (sum, rate) = papi
            .measure_flops(|| (1..10_000).map(|i| 1.0 / i as f64).sum::<f64>())
            .unwrap();
        assert!(sum > 1.0);
        assert_eq!(rate.event, ffi::PAPI_FP_OPS);
        assert!(rate.flpops >= 0);
        assert!(rate.rtime >= 0.0);
    }
}
