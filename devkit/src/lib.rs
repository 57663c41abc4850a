/*!
Linkwatch development kit

Scripted doubles for the router, screenshot and ping ports plus a harness
that replays monitoring cycles on a manual clock.
*/

pub mod scripted;
pub mod test_utils;

pub use scripted::{status_label, ScriptedProber, ScriptedRouter};
pub use test_utils::MonitorHarness;
