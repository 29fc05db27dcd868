pub mod chain;
pub mod classify;
pub mod event;
pub mod set_cookie;

pub use chain::{build, ChainBuild};
pub use classify::Classifier;
pub use event::{decode_entry, NetworkEvent};
