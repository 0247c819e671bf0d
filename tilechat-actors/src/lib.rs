//! Lightweight actor runtime for Tilechat.
//!
//! An actor owns its state and processes one message at a time from a bounded
//! mailbox; see [`actor::Actor`]. Slow work runs in spawned tasks that send
//! their result back to the actor's [`actor::Addr`]. A [`system::Supervisor`]
//! owns every actor task and drives shutdown.
pub mod actor;
pub mod system;

pub use actor::{spawn_actor, spawn_actor_with_shutdown, Actor, ActorHandle, Addr, Context};
pub use system::{ShutdownHandle, Supervisor};
