use log::info;
use papi_utils::{Counter, EventSet, Papi};

fn fibonacci(n: u32) -> u32 {
    match n {
        0 => 1,
        1 => 1,
        _ => fibonacci(n - 1) + fibonacci(n - 2),
    }
}

fn main() -> papi_utils::Result<()> {
    env_logger::init();

    // Events to count, by name
    let mut names: Vec<String> = std::env::args().skip(1).collect();
    if names.is_empty() {
        names = vec!["PAPI_TOT_INS".into(), "PAPI_TOT_CYC".into()];
    }

    let papi = Papi::init()?;
    let events = names
        .iter()
        .fold(EventSet::build(), |b, name| b.event(name))
        .open(&papi)?;

    for run in 0..2 {
        info!("Starting workload. Run {}.", run);
        let (fib, counts) = events.measure(|| fibonacci(25))?;
        info!("fibonacci(25) = {}", fib);
        for (name, count) in names.iter().zip(counts) {
            info!("{:>16} {}", name, count);
        }
    }

    let ipc = papi.ipc()?;
    fibonacci(25);
    let ipc = papi.ipc().map(|after| after.ipc).unwrap_or(ipc.ipc);
    papi.rate_stop()?;
    info!("IPC {:.2}", ipc);

    Ok(())
}
