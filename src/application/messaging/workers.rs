//! Per-chat workers - one sequential task per chat, chats run concurrently

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};
use tokio::task::JoinHandle;

use crate::application::services::MessageService;
use crate::domain::entities::{ChatId, Message};
use crate::domain::traits::Bot;

const DEFAULT_QUEUE_DEPTH: usize = 64;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

struct Worker {
    queue: mpsc::Sender<Message>,
    task: JoinHandle<()>,
}

/// Feeds messages to per-chat queues in arrival order.
/// A worker with nothing to do for `idle_timeout` exits and is reaped on the next submit.
pub struct ChatWorkers<B: Bot + 'static> {
    service: Arc<MessageService<B>>,
    workers: HashMap<ChatId, Worker>,
    queue_depth: usize,
    idle_timeout: Duration,
}

impl<B: Bot + 'static> ChatWorkers<B> {
    pub fn new(service: Arc<MessageService<B>>) -> Self {
        Self {
            service,
            workers: HashMap::new(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn service(&self) -> &Arc<MessageService<B>> {
        &self.service
    }

    /// Queue a message behind earlier messages of the same chat.
    /// Waits when that chat's queue is full.
    pub async fn submit(&mut self, message: Message) {
        self.reap();
        let chat_id = message.chat_id;
        let mut message = message;
        let mut previous = None;
        loop {
            let queue = self.queue_for(chat_id, previous.take());
            match queue.send(message).await {
                Ok(()) => return,
                Err(SendError(returned)) => {
                    previous = self.retire(chat_id);
                    message = returned;
                }
            }
        }
    }

    /// Like [`submit`](Self::submit), but never waits. A message for a chat
    /// whose queue is full is dropped and `false` returned.
    pub fn try_submit(&mut self, message: Message) -> bool {
        self.reap();
        let chat_id = message.chat_id;
        let mut message = message;
        let mut previous = None;
        loop {
            let queue = self.queue_for(chat_id, previous.take());
            match queue.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!("Queue for chat {} is full, dropping message {}", chat_id, dropped.id);
                    return false;
                }
                Err(TrySendError::Closed(returned)) => {
                    previous = self.retire(chat_id);
                    message = returned;
                }
            }
        }
    }

    /// Chats with a running worker
    pub fn active_chats(&self) -> usize {
        self.workers.values().filter(|w| !w.task.is_finished()).count()
    }

    /// Forget workers that exited
    pub fn reap(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|_, worker| !worker.task.is_finished());
        let reaped = before - self.workers.len();
        if reaped > 0 {
            tracing::debug!("Reaped {} idle chat workers", reaped);
        }
    }

    /// Close every queue and wait for queued messages to drain
    pub async fn shutdown(self) {
        let tasks: Vec<_> = self
            .workers
            .into_values()
            .map(|worker| {
                drop(worker.queue);
                worker.task
            })
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Chat worker panicked: {}", e);
            }
        }
    }

    fn queue_for(&mut self, chat_id: ChatId, previous: Option<JoinHandle<()>>) -> mpsc::Sender<Message> {
        if let Some(worker) = self.workers.get(&chat_id) {
            return worker.queue.clone();
        }
        let worker = self.spawn(chat_id, previous);
        let queue = worker.queue.clone();
        self.workers.insert(chat_id, worker);
        queue
    }

    /// Drop a worker that stopped accepting messages; its task may still be draining
    fn retire(&mut self, chat_id: ChatId) -> Option<JoinHandle<()>> {
        tracing::debug!("Worker for chat {} went idle, restarting it", chat_id);
        self.workers.remove(&chat_id).map(|worker| worker.task)
    }

    fn spawn(&self, chat_id: ChatId, previous: Option<JoinHandle<()>>) -> Worker {
        let (queue, mut inbox) = mpsc::channel::<Message>(self.queue_depth);
        let service = Arc::clone(&self.service);
        let idle_timeout = self.idle_timeout;
        let task = tokio::spawn(async move {
            // earlier messages of this chat finish first
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::error!("Chat worker panicked: {}", e);
                }
            }
            tracing::debug!("Worker for chat {} started", chat_id);
            loop {
                match tokio::time::timeout(idle_timeout, inbox.recv()).await {
                    Ok(Some(message)) => handle(&service, chat_id, message).await,
                    Ok(None) => break,
                    Err(_) => {
                        inbox.close();
                        while let Ok(message) = inbox.try_recv() {
                            handle(&service, chat_id, message).await;
                        }
                        break;
                    }
                }
            }
            tracing::debug!("Worker for chat {} finished", chat_id);
        });
        Worker { queue, task }
    }
}

async fn handle<B: Bot>(service: &MessageService<B>, chat_id: ChatId, message: Message) {
    if let Err(e) = service.process(message).await {
        tracing::error!("Failed to handle message in chat {}: {}", chat_id, e);
    }
}
