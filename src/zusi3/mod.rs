//! Zusi3 binary TCP source: wire codec, FsData identifiers, client/session
//! state machine, and DATA_FTD decoding (C1/C2).

pub mod client;
pub mod codec;
pub mod decode;
pub mod fsdata;
