// Command/status exchange between the overlay and the simulator controller
//
// Provides:
// - Single-slot mailbox transports (file, memory, zenoh)
// - Injectable clock for record timestamps
// - Status writer/reader and command writer/reader pollers

mod clock;
mod command;
mod error;
mod file;
mod mailbox;
mod status;
mod zenoh_mailbox;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandReader, CommandWriter};
pub use error::{ExchangeError, Result};
pub use file::FileMailbox;
pub use mailbox::{Mailbox, MemoryMailbox};
pub use status::{LinkState, StatusReader, StatusWriter};
pub use zenoh_mailbox::ZenohMailbox;
