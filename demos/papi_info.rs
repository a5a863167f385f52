use log::info;
use papi_utils::structs;
use papi_utils::Papi;

fn main() -> papi_utils::Result<()> {
    env_logger::init();

    // Optional library path, otherwise PAPI_LIBRARY and the default search path
    let papi = match std::env::args().nth(1) {
        Some(path) => Papi::build().library(path.into()).open()?,
        None => Papi::init()?,
    };
    info!("Loaded PAPI {} from {}", papi.version(), papi.path().display());

    let mut report = serde_json::Map::new();
    report.insert("hardware".into(), papi.hardware_info()?.to_json());
    report.insert("executable".into(), papi.executable_info()?.to_json());
    report.insert("shared_libraries".into(), papi.shared_lib_info()?.to_json());
    report.insert("memory".into(), papi.dmem_info()?.to_json());
    let components: Vec<serde_json::Value> =
        papi.components()?.iter().map(|c| c.to_json()).collect();
    report.insert("components".into(), components.into());

    // Dump everything we know how to decode
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(report))
            .unwrap_or_default()
    );
    info!(
        "Record types: {:?}",
        structs::tables().iter().map(|t| t.name).collect::<Vec<_>>()
    );

    Ok(())
}
