// Lock-free channels between control threads and the audio loop

use crate::messaging::notification::Notification;
use crate::task::trait_def::Task;
use ringbuf::{HeapRb, traits::Split};

pub type TaskProducer = ringbuf::HeapProd<Box<dyn Task>>;
pub type TaskConsumer = ringbuf::HeapCons<Box<dyn Task>>;

pub fn create_task_channel(capacity: usize) -> (TaskProducer, TaskConsumer) {
    let rb = HeapRb::<Box<dyn Task>>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::notification::NotificationCategory;
    use ringbuf::traits::{Consumer, Observer, Producer};

    #[test]
    fn test_notification_channel_capacity() {
        let (mut tx, mut rx) = create_notification_channel(2);
        for (tic, message) in [(0, "a"), (1, "b")] {
            assert!(tx.try_push(Notification::warning(NotificationCategory::Task, tic, message)).is_ok());
        }
        assert!(tx.try_push(Notification::warning(NotificationCategory::Task, 2, "c")).is_err());

        assert_eq!(rx.occupied_len(), 2);
        assert_eq!(rx.try_pop().map(|n| n.message), Some("a".to_string()));
    }

    #[test]
    fn test_task_channel_keeps_order() {
        use crate::graph::Graph;
        use crate::task::trait_def::{LaunchGuard, TaskResult};

        struct Named(&'static str, LaunchGuard);

        impl Task for Named {
            fn launch(&mut self, _graph: &mut Graph) -> TaskResult<()> {
                self.1.begin("named")
            }

            fn description(&self) -> String {
                self.0.to_string()
            }
        }

        let (mut tx, mut rx) = create_task_channel(4);
        for name in ["link", "start"] {
            assert!(tx.try_push(Box::new(Named(name, LaunchGuard::new()))).is_ok());
        }

        let order: Vec<String> = std::iter::from_fn(|| rx.try_pop())
            .map(|task| task.description())
            .collect();
        assert_eq!(order, vec!["link", "start"]);
    }
}
