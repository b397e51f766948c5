//! Fire-and-forget background work, processed by a single worker task.

pub mod email;

use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};

use crate::entities::{customer, user};
use email::Mailer;

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    NotifyCustomers { message: String },
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task worker is not running")]
    WorkerStopped,
}

#[derive(Clone, Debug)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Starts the worker and returns the handle used to enqueue work.
    pub fn spawn(db: Arc<DatabaseConnection>, mailer: Mailer) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(receiver, db, mailer));
        (TaskQueue { sender }, worker)
    }

    pub fn notify_customers(&self, message: impl Into<String>) -> Result<(), TaskError> {
        self.enqueue(Task::NotifyCustomers {
            message: message.into(),
        })
    }

    fn enqueue(&self, task: Task) -> Result<(), TaskError> {
        self.sender
            .send(task)
            .map_err(|_| TaskError::WorkerStopped)
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<Task>,
    db: Arc<DatabaseConnection>,
    mailer: Mailer,
) {
    while let Some(task) = receiver.recv().await {
        match task {
            Task::NotifyCustomers { message } => {
                match notify_customers(&db, &mailer, &message).await {
                    Ok(sent) => info!(sent, "Customer notification finished"),
                    Err(err) => error!(error = %err, "Customer notification failed"),
                }
            }
        }
    }
    info!("Task worker stopped");
}

/// Emails `message` to every customer. One failed recipient does not stop the rest.
pub async fn notify_customers(
    db: &DatabaseConnection,
    mailer: &Mailer,
    message: &str,
) -> Result<usize, DbErr> {
    let recipients: Vec<String> = customer::Entity::find()
        .find_also_related(user::Entity)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(_, user)| user.map(|user| user.email))
        .filter(|email| !email.is_empty())
        .collect();

    info!(recipients = recipients.len(), "Sending customer notification");

    let mut sent = 0;
    for recipient in &recipients {
        match mailer.send(recipient, "Storefront news", message).await {
            Ok(()) => sent += 1,
            Err(err) => warn!(recipient = %recipient, error = %err, "Failed to notify customer"),
        }
    }

    Ok(sent)
}
