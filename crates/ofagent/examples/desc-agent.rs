//! Minimal agent: serves one controller connection with a fixed descriptor.
//!
//! Run with:
//!   cargo run --example desc-agent
//!
//! In another terminal:
//!   cargo run --features cli -- describe /tmp/ofagent-desc-<pid>/agent.sock

use std::fs;

use ofagent::session::{AgentConfig, AgentListener, MemoryDeviceStore};
use ofagent::wire::DescriptorRecord;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("ofagent-desc-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("agent.sock");

    let record = DescriptorRecord {
        manufacturer: "Example Networks".to_string(),
        hardware_version: "rev-a".to_string(),
        software_version: env!("CARGO_PKG_VERSION").to_string(),
        serial_number: "EX-0001".to_string(),
        datapath_description: "example datapath".to_string(),
    };
    let config = AgentConfig::default();
    let store = MemoryDeviceStore::new().with_descriptor(config.datapath_id, record);

    let listener = AgentListener::bind(&sock_path, store, config)?;
    eprintln!("Listening on {}", sock_path.display());

    let summary = listener.serve_one()?;
    eprintln!(
        "Controller disconnected after {} messages ({} described)",
        summary.messages, summary.described
    );

    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
