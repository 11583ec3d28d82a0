use ofagent_session::{ReplyBuilder, StreamSession};
use ofagent_wire::{PoolConfig, SegmentPool};

use crate::cmd::{check_segment_size, load_descriptor, EncodeArgs};
use crate::exit::{protocol_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    check_segment_size(args.segment_size)?;

    let record = load_descriptor(&args.descriptor)?;
    let frame = encode_reply(&record, args.version, args.xid, args.segment_size)?;

    print_frame(&frame, args.version, args.xid, format);
    Ok(SUCCESS)
}

fn encode_reply(
    record: &ofagent_wire::DescriptorRecord,
    version: u8,
    xid: u32,
    segment_size: usize,
) -> CliResult<Vec<u8>> {
    let builder = ReplyBuilder::new(SegmentPool::new(PoolConfig {
        segment_size,
        max_outstanding_segments: None,
    }));
    // The reply is never sent; the session only supplies the version.
    let offline = StreamSession::new(std::io::sink(), version, 0);

    let list = builder
        .build(&offline, record, xid)
        .map_err(|err| protocol_error("encode failed", err))?;
    let frame = list.to_vec();
    list.release();
    Ok(frame)
}
