use std::path::Path;
use std::time::{Duration, Instant};

use ofagent_session::{connect, ConnectConfig, ControllerConnection, SessionError};
use ofagent_transport::TransportError;

use crate::cmd::{parse_timeout, DescribeArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_descriptor, OutputFormat};

pub fn run(args: DescribeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let config = ConnectConfig {
        version: args.version,
        timeout,
        ..ConnectConfig::default()
    };

    let mut connection = connect_with_retry(&args.path, &config, timeout)?;
    let record = connection
        .request_desc()
        .map_err(|err| session_error("describe failed", err))?;

    print_descriptor(&record, connection.negotiated_version(), format);
    Ok(SUCCESS)
}

fn connect_with_retry(
    path: &Path,
    config: &ConnectConfig,
    timeout: Duration,
) -> CliResult<ControllerConnection> {
    let start = Instant::now();
    loop {
        match connect(path, config) {
            Ok(connection) => return Ok(connection),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(session_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &SessionError) -> bool {
    match err {
        SessionError::Transport(TransportError::Connect { source, .. }) => {
            source.kind() == std::io::ErrorKind::NotFound
                || source.kind() == std::io::ErrorKind::ConnectionRefused
        }
        _ => false,
    }
}
