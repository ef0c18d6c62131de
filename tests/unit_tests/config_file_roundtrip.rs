use std::{
    fs,
    path::PathBuf,
    sync::atomic::{AtomicU32, Ordering},
};

use cluster_rpc_client::cfg::config::NetworkClientConfig;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Writes `content` to a uniquely named file under the OS temp dir and
/// returns its path. The file is never cleaned up explicitly; it lives in
/// the ephemeral temp directory like the rest of a test run's scratch
/// files.
fn write_temp_yaml(content: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("cluster-rpc-client-test-cfg-{}-{n}.yaml", std::process::id()));
    fs::write(&path, content).expect("write temp config file");
    path
}

/// Loading a config written to an actual file on disk (not just parsed
/// from an in-memory string) exercises the `fs::read_to_string` +
/// `validate()` path `load_from_file` wires together.
#[test]
fn load_from_file_reads_and_validates() {
    let path = write_temp_yaml(
        "maxConnectionsPerNode: 4\n\
         connectTimeoutMillis: 1000\n\
         writeTimeoutMillis: 1000\n\
         requestStatisticsWindowSeconds: 30\n",
    );

    let cfg = NetworkClientConfig::load_from_file(&path).expect("file loads and validates");
    assert_eq!(cfg.max_connections_per_node, 4);
    assert_eq!(cfg.connect_timeout_millis, 1000);
    // Fields omitted from the file fall back to their defaults.
    assert_eq!(cfg.default_max_retry, 2);
    assert!(cfg.duplicates_ok);
}

#[test]
fn load_from_file_rejects_invalid_values() {
    let path = write_temp_yaml("maxConnectionsPerNode: 0\n");
    let result = NetworkClientConfig::load_from_file(&path);
    assert!(result.is_err(), "zero connections per node must fail validation");
}

#[test]
fn load_from_file_surfaces_malformed_yaml() {
    let path = write_temp_yaml("maxConnectionsPerNode: [this, is, not, a, number]\n");
    let result = NetworkClientConfig::load_from_file(&path);
    assert!(result.is_err());
}
