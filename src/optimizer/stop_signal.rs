//! # Stop Signal
//!
//! Segnale di cancellazione cooperativo basato su `tokio::sync::broadcast`.
//! Viene controllato solo tra un file e l'altro e durante l'attesa del polling.

use tokio::sync::broadcast;
use tracing::debug;

/// Cooperative stop signal shared by batch passes and the watcher
pub struct StopSignal {
    receiver: Option<broadcast::Receiver<()>>,
    // Once received, stays set
    fired: bool,
}

impl StopSignal {
    /// Signal that never fires
    pub fn never() -> Self {
        Self {
            receiver: None,
            fired: false,
        }
    }

    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self {
            receiver: Some(receiver),
            fired: false,
        }
    }

    /// Create a sender and a matching stop signal
    pub fn channel() -> (broadcast::Sender<()>, Self) {
        let (sender, receiver) = broadcast::channel(1);
        (sender, Self::new(receiver))
    }

    /// Checks if a stop signal has been received, without waiting
    pub fn should_stop(&mut self) -> bool {
        if self.fired {
            return true;
        }
        let Some(ref mut receiver) = self.receiver else {
            return false;
        };

        match receiver.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                debug!("Stop signal received");
                self.fired = true;
                true
            }
            Err(broadcast::error::TryRecvError::Empty) => false,
            // Sender was dropped, keep going
            Err(broadcast::error::TryRecvError::Closed) => false,
        }
    }

    /// Resolves once a stop signal arrives; never resolves if the sender is gone
    pub async fn stopped(&mut self) {
        if self.fired {
            return;
        }
        let Some(ref mut receiver) = self.receiver else {
            return std::future::pending().await;
        };

        match receiver.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                debug!("Stop signal received while waiting");
                self.fired = true;
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        }
    }
}
