use crate::domain::model::Item;
use crate::utils::error::{Result, TokenError};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Bounded buffer between the ingress boundary and the throttle.
///
/// `push` waits for capacity when the queue is full, so a slow pipeline
/// stalls the producer instead of dropping items.
#[derive(Debug, Clone)]
pub struct IngressQueue {
    sender: mpsc::Sender<Item>,
    capacity: usize,
}

impl IngressQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Item>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender, capacity }, receiver)
    }

    pub async fn push(&self, item: Item) -> Result<()> {
        self.sender
            .send(item)
            .await
            .map_err(|_| TokenError::PipelineClosed)
    }

    pub fn try_push(&self, item: Item) -> Result<()> {
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => TokenError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => TokenError::PipelineClosed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.sender.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    fn item(id: &str) -> Item {
        Item::new(id, 1).unwrap()
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let (queue, mut rx) = IngressQueue::bounded(2);
        queue.push(item("a")).await.unwrap();
        queue.push(item("b")).await.unwrap();
        assert_eq!(queue.available(), 0);

        let mut blocked = task::spawn(queue.push(item("c")));
        assert_pending!(blocked.poll());

        // 消費一筆後，被卡住的 push 應該可以完成
        assert_eq!(rx.recv().await.unwrap().id(), "a");
        assert!(blocked.is_woken());
        assert_ready_ok!(blocked.poll());

        assert_eq!(rx.recv().await.unwrap().id(), "b");
        assert_eq!(rx.recv().await.unwrap().id(), "c");
    }

    #[tokio::test]
    async fn test_try_push_reports_full_and_closed() {
        let (queue, rx) = IngressQueue::bounded(1);
        queue.try_push(item("a")).unwrap();

        let err = queue.try_push(item("b")).unwrap_err();
        assert!(matches!(err, TokenError::QueueFull { capacity: 1 }));

        drop(rx);
        assert!(queue.is_closed());
        let err = queue.push(item("c")).await.unwrap_err();
        assert!(matches!(err, TokenError::PipelineClosed));
    }
}
