use anyhow::{Context, Result};
use log::{error, info};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};

/// Single-shot notification that the process should wind down.
pub struct Shutdown {
    rx: oneshot::Receiver<()>,
}

impl Shutdown {
    /// Register for SIGINT now and forward the first delivery.
    ///
    /// Registration happens before this returns, so an interrupt arriving while
    /// resources are still being acquired is not lost. The handler stays
    /// installed for the life of the process; later interrupts are swallowed.
    pub fn listen() -> Result<Self> {
        let mut interrupt =
            signal(SignalKind::interrupt()).context("failed to register the interrupt handler")?;
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            match interrupt.recv().await {
                Some(()) => info!("Received signal, exiting.."),
                None => error!("interrupt stream closed, exiting.."),
            }
            let _ = tx.send(());
        });

        Ok(Self { rx })
    }

    /// A shutdown driven by the returned sender instead of a signal.
    #[cfg(test)]
    pub fn channel() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Resolves once shutdown is requested, or when the sender is gone.
    pub async fn recv(self) {
        let _ = self.rx.await;
    }
}
