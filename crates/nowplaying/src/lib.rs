//! Now-playing touch display: polling/redraw state machine and its adapters.
//!
//! The orchestration core lives in [`session`]; everything it talks to is
//! passed in explicitly (player client, presenter, touch receiver, weather
//! feed) so the loop runs the same against hardware, the terminal simulator
//! or test doubles.

pub mod buttons;
pub mod client;
pub mod clock;
pub mod logging;
pub mod presenter;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod terminal;
pub mod touch;
pub mod weather;
