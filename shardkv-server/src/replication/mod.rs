//! Pull-based single-master replication: the master serves "next segment
//! after X"; the slave pulls on a ticker and replays locally.

pub mod master;
pub mod slave;
