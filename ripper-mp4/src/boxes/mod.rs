mod alac;
mod header;
mod tfhd;
mod trex;
mod trun;

pub use alac::AlacConfig;
pub use header::HeaderBox;
pub use tfhd::TfhdBox;
pub use trex::TrexBox;
pub use trun::{TrunBox, TrunSample};
