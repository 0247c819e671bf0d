use anyhow::Result;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

/// Minimal actor trait. `Self: Sized` avoids object-safety issues when using `Context<Self>`.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;

    /// Called once after the mailbox closes or the actor stops, before the task ends.
    async fn stopped(&mut self) {}
}

/// Runtime context for an actor instance.
pub struct Context<A: Actor> {
    addr: Addr<A>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// Get a clone of this actor's `Addr`, e.g. to hand to a spawned task
    /// that reports back.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use tilechat_actors::actor::{self, Actor, Context};
    /// enum Job {
    ///     Start,
    ///     Done(String),
    /// }
    ///
    /// struct Fetcher;
    ///
    /// #[async_trait]
    /// impl Actor for Fetcher {
    ///     type Msg = Job;
    ///     async fn handle(&mut self, msg: Job, ctx: &mut Context<Self>) -> Result<()> {
    ///         match msg {
    ///             Job::Start => {
    ///                 let me = ctx.addr();
    ///                 tokio::spawn(async move {
    ///                     let _ = me.send(Job::Done("reply".into())).await;
    ///                 });
    ///             }
    ///             Job::Done(text) => {
    ///                 assert_eq!(text, "reply");
    ///                 ctx.stop();
    ///             }
    ///         }
    ///         Ok(())
    ///     }
    /// }
    ///
    /// # let rt = tokio::runtime::Runtime::new().unwrap();
    /// # rt.block_on(async {
    /// let actor::ActorHandle { addr, task } = actor::spawn_actor(Fetcher, 4);
    /// assert!(addr.send(Job::Start).await.is_ok());
    /// drop(addr);
    /// task.await.unwrap().unwrap();
    /// # });
    /// ```
    pub fn addr(&self) -> Addr<A> {
        self.addr.clone()
    }

    /// Request a graceful stop after processing the current message.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub fn is_stopping(&self) -> bool {
        self.stop
    }
}

/// Address for sending messages to an actor.
pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

/// Manual Clone to avoid unnecessary bounds on `A`/`A::Msg`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the message if the receiver is dropped.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// Try to send without waiting. Returns the message if the mailbox is full or closed.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use tilechat_actors::actor::{self, Actor, Context};
    /// # struct OneShot;
    /// # #[async_trait]
    /// # impl Actor for OneShot {
    /// #     type Msg = &'static str;
    /// #     async fn handle(&mut self, _msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
    /// #         ctx.stop();
    /// #         Ok(())
    /// #     }
    /// # }
    /// # let rt = tokio::runtime::Runtime::new().unwrap();
    /// # rt.block_on(async {
    /// let actor::ActorHandle { addr, task } = actor::spawn_actor(OneShot, 1);
    /// assert_eq!(addr.try_send("first"), Ok(()));
    /// task.await.unwrap().unwrap();
    /// // The actor has stopped, so the message comes back.
    /// assert_eq!(addr.try_send("late"), Err("late"));
    /// # });
    /// ```
    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }

    /// Bounded mailbox capacity.
    pub fn capacity(&self) -> usize {
        self.0.max_capacity()
    }

    /// True once the actor task has dropped its mailbox.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Handle to a running actor task.
pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Spawn an actor with a bounded mailbox.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - all senders are dropped
/// - `ctx.stop()` is called
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use tilechat_actors::actor::{self, Actor, Context};
/// # use std::sync::{Arc, Mutex};
/// struct Lines(Arc<Mutex<Vec<String>>>);
///
/// #[async_trait]
/// impl Actor for Lines {
///     type Msg = String;
///     async fn handle(&mut self, line: String, ctx: &mut Context<Self>) -> Result<()> {
///         if line == "/quit" {
///             ctx.stop();
///         } else {
///             self.0.lock().unwrap().push(line);
///         }
///         Ok(())
///     }
/// }
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let actor::ActorHandle { addr, task } = actor::spawn_actor(Lines(seen.clone()), 8);
/// for line in ["hi", "grout?", "/quit", "ignored"] {
///     let _ = addr.send(line.to_string()).await;
/// }
/// task.await.unwrap().unwrap();
/// assert_eq!(*seen.lock().unwrap(), ["hi", "grout?"]);
/// # });
/// ```
pub fn spawn_actor<A: Actor>(actor: A, capacity: usize) -> ActorHandle<A> {
    spawn_actor_with_shutdown(actor, capacity, None)
}

/// Like [`spawn_actor`], but also stops when `shutdown` fires.
pub fn spawn_actor_with_shutdown<A: Actor>(
    actor: A,
    capacity: usize,
    shutdown: Option<broadcast::Receiver<()>>,
) -> ActorHandle<A> {
    let (tx, rx) = mpsc::channel::<A::Msg>(capacity);
    let addr = Addr(tx);
    let ctx = Context {
        addr: addr.clone(),
        stop: false,
    };

    let task = tokio::spawn(run(actor, rx, ctx, shutdown));
    ActorHandle { addr, task }
}

async fn run<A: Actor>(
    mut actor: A,
    mut rx: mpsc::Receiver<A::Msg>,
    mut ctx: Context<A>,
    shutdown: Option<broadcast::Receiver<()>>,
) -> Result<()> {
    let result = match shutdown {
        Some(mut shutdown_rx) => loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                maybe_msg = rx.recv() => match maybe_msg {
                    Some(msg) => {
                        if let Err(e) = dispatch(&mut actor, msg, &mut ctx).await {
                            break Err(e);
                        }
                        if ctx.stop {
                            break Ok(());
                        }
                    }
                    None => break Ok(()),
                },
            }
        },
        None => loop {
            match rx.recv().await {
                Some(msg) => {
                    if let Err(e) = dispatch(&mut actor, msg, &mut ctx).await {
                        break Err(e);
                    }
                    if ctx.stop {
                        break Ok(());
                    }
                }
                None => break Ok(()),
            }
        },
    };

    actor.stopped().await;
    result
}

async fn dispatch<A: Actor>(actor: &mut A, msg: A::Msg, ctx: &mut Context<A>) -> Result<()> {
    actor.handle(msg, ctx).await.inspect_err(|e| {
        tracing::error!(target = "tilechat-actors", error = ?e, "actor returned error; stopping");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Recorder {
        seen: Vec<u32>,
        out: Arc<std::sync::Mutex<Vec<u32>>>,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Actor for Recorder {
        type Msg = u32;

        async fn handle(&mut self, msg: u32, ctx: &mut Context<Self>) -> Result<()> {
            if msg == 99 {
                anyhow::bail!("poison");
            }
            self.seen.push(msg);
            if msg == 0 {
                ctx.stop();
            }
            Ok(())
        }

        async fn stopped(&mut self) {
            self.out.lock().unwrap().extend(self.seen.drain(..));
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn recorder() -> (Recorder, Arc<std::sync::Mutex<Vec<u32>>>, Arc<AtomicBool>) {
        let out = Arc::new(std::sync::Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        (
            Recorder {
                seen: Vec::new(),
                out: out.clone(),
                stopped: stopped.clone(),
            },
            out,
            stopped,
        )
    }

    #[tokio::test]
    async fn messages_are_handled_in_order_until_stop() {
        let (actor, out, stopped) = recorder();
        let ActorHandle { addr, task } = spawn_actor(actor, 8);
        for n in [3, 1, 2, 0, 7] {
            addr.send(n).await.unwrap();
        }
        task.await.unwrap().unwrap();
        assert_eq!(*out.lock().unwrap(), vec![3, 1, 2, 0]);
        assert!(stopped.load(Ordering::SeqCst));
        assert!(addr.is_closed());
    }

    #[tokio::test]
    async fn handler_error_stops_the_actor() {
        let (actor, out, _) = recorder();
        let ActorHandle { addr, task } = spawn_actor(actor, 8);
        addr.send(5).await.unwrap();
        addr.send(99).await.unwrap();
        assert!(task.await.unwrap().is_err());
        assert_eq!(*out.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_an_idle_actor() {
        let (tx, rx) = broadcast::channel(1);
        let (actor, _, stopped) = recorder();
        let ActorHandle { addr, task } = spawn_actor_with_shutdown(actor, 8, Some(rx));
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        drop(addr);
    }
}
