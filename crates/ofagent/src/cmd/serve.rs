use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ofagent_session::{AgentConfig, AgentListener, MemoryDeviceStore, SessionError};
use ofagent_transport::UnixDomainSocket;
use ofagent_wire::PoolConfig;
use tracing::{info, warn};

use crate::cmd::{check_segment_size, load_descriptor, parse_timeout, ServeArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_connection, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    check_segment_size(args.segment_size)?;

    let record = load_descriptor(&args.descriptor)?;
    let store = MemoryDeviceStore::new().with_descriptor(args.dpid, record);
    let config = AgentConfig {
        datapath_id: args.dpid,
        version: args.version,
        pool: PoolConfig {
            segment_size: args.segment_size,
            max_outstanding_segments: None,
        },
        hello_timeout: parse_timeout(&args.hello_timeout)?,
        ..AgentConfig::default()
    };

    let listener = AgentListener::bind(&args.path, store, config)
        .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), listener.path().to_path_buf())?;

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        let result = listener.serve_one();
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match result {
            Ok(summary) => print_connection(&summary, format),
            Err(SessionError::Transport(err)) => {
                return Err(session_error("accept failed", SessionError::Transport(err)));
            }
            Err(err) => warn!(error = %err, "connection ended with error"),
        }

        served = served.saturating_add(1);
        if let Some(count) = args.count {
            if served >= count {
                break;
            }
        }
    }

    let stats = listener.pool().stats();
    info!(
        connections = served,
        lists_allocated = stats.lists_allocated(),
        lists_outstanding = stats.outstanding_lists(),
        "agent stopped"
    );
    Ok(SUCCESS)
}

/// On Ctrl-C, clear `running` and connect once to wake a blocked accept.
fn install_ctrlc_handler(running: Arc<AtomicBool>, path: PathBuf) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = UnixDomainSocket::connect(&path);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
