use crate::domain::models::Block;
use crate::infrastructure::block_store::BlockRepository;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub type BlockSnapshot = Arc<Vec<Block>>;

#[derive(Debug)]
pub struct SaveQueue {
    sender: watch::Sender<Option<BlockSnapshot>>,
}

impl SaveQueue {
    pub fn spawn(repository: Arc<dyn BlockRepository>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = watch::channel(None);
        let worker = tokio::spawn(run_worker(receiver, repository));
        (Self { sender }, worker)
    }

    pub fn publish(&self, snapshot: BlockSnapshot) {
        self.sender.send_replace(Some(snapshot));
    }

    pub async fn shutdown(self, worker: JoinHandle<()>) {
        drop(self.sender);
        if let Err(error) = worker.await {
            error!(%error, "save worker terminated abnormally");
        }
    }
}

async fn run_worker(
    mut receiver: watch::Receiver<Option<BlockSnapshot>>,
    repository: Arc<dyn BlockRepository>,
) {
    while receiver.changed().await.is_ok() {
        let Some(snapshot) = receiver.borrow_and_update().clone() else {
            continue;
        };
        let block_count = snapshot.len();
        let repository = Arc::clone(&repository);
        match tokio::task::spawn_blocking(move || repository.replace_all(&snapshot)).await {
            Ok(Ok(())) => debug!(block_count, "saved block snapshot"),
            Ok(Err(error)) => error!(%error, block_count, "failed to save block snapshot"),
            Err(error) => error!(%error, "block save task aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::block_store::InMemoryBlockRepository;
    use crate::infrastructure::error::InfraError;

    fn block(id: &str) -> Block {
        Block {
            id: id.to_string(),
            item_id: "item".to_string(),
            start: 0,
            len: 1,
            amount: 1,
            memo: String::new(),
            approved: false,
            start_at: None,
            end_at: None,
            created_by: None,
            updated_by: None,
        }
    }

    struct FailingRepository;

    impl BlockRepository for FailingRepository {
        fn load_blocks(&self) -> Result<Vec<Block>, InfraError> {
            Ok(Vec::new())
        }

        fn replace_all(&self, _blocks: &[Block]) -> Result<(), InfraError> {
            Err(InfraError::Store("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn last_published_snapshot_wins() {
        let repository = Arc::new(InMemoryBlockRepository::default());
        let (queue, worker) = SaveQueue::spawn(repository.clone());

        for index in 0..20 {
            let snapshot = (0..=index).map(|n| block(&format!("b{n}"))).collect::<Vec<_>>();
            queue.publish(Arc::new(snapshot));
        }
        queue.shutdown(worker).await;

        let saved = repository.load_blocks().expect("load saved");
        assert_eq!(saved.len(), 20);
        assert_eq!(saved.last().map(|b| b.id.as_str()), Some("b19"));
        let saves = repository.save_count().expect("save count");
        assert!((1..=20).contains(&saves));
    }

    #[tokio::test]
    async fn save_failures_do_not_stop_the_worker() {
        let (queue, worker) = SaveQueue::spawn(Arc::new(FailingRepository));
        queue.publish(Arc::new(vec![block("a")]));
        queue.publish(Arc::new(vec![block("b")]));
        queue.shutdown(worker).await;
    }
}
