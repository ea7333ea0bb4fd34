// Coalesced polling: many pollers sharing one GCD-paced timer

pub mod engine;
pub mod interval;
pub mod payload;
pub mod poller;

pub use engine::{PollScheduler, TickReport};
pub use interval::{gcd, tick_interval};
pub use payload::{Batch, Payload, PollOutput};
pub use poller::{Generator, Poller, PollerId};
