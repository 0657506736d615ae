// Messaging - task and notification channels

pub mod channels;
pub mod notification;

pub use channels::{
    NotificationConsumer, NotificationProducer, TaskConsumer, TaskProducer,
    create_notification_channel, create_task_channel,
};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
