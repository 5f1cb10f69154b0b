use tokio::sync::mpsc;

/// Collects every message sent over the channel until all senders are dropped.
pub async fn collect<T>(mut rx: mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    messages
}

/// Collects every message already sent over the channel, without waiting.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
