//! # MPEG Audio Elementary Streams
//!
//! Tag skipping, frame synchronisation and incremental frame assembly for
//! MPEG-1/2/2.5 Layer I/II/III streams.

mod assembler;
mod header;
mod id3;

pub use assembler::{AssembledFrame, FrameAssembler};
pub use header::{
    ChannelMode, FrameInfo, HeaderRejection, MpegFrameHeader, MpegFrameScanner, MpegLayer,
    MpegVersion,
};
pub use id3::{synchsafe_size, Id3Decision, Id3TagSkipper, ID3_HEADER_LEN};
