use cluster_rpc_client::cfg::logger::init_logger;
use serial_test::serial;

/// `init_logger` installs a process-global `tracing` subscriber, so only
/// one test in the whole binary may call it; `#[serial]` keeps it from
/// racing any other test that happens to touch global tracing state.
#[test]
#[serial]
fn init_logger_loads_the_demo_config() {
    let guard = init_logger("config/logger.yaml");
    assert!(guard.is_ok(), "demo logger config must parse and install a subscriber");
    tracing::info!("logger initialized from unit test");
}

#[test]
#[serial]
fn init_logger_reports_a_missing_file() {
    let guard = init_logger("config/does-not-exist.yaml");
    assert!(guard.is_err());
}
