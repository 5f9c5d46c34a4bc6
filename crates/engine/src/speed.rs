use crossbeam::channel::{self, Receiver, Sender, TrySendError};

/// Creates a single-slot speed channel.
///
/// Publishing always succeeds and overwrites a value the consumer has not
/// picked up yet, so the consumer never works through a backlog of stale
/// speeds.
pub fn speed_channel() -> (SpeedSender, SpeedReceiver) {
    let (sender, receiver) = channel::bounded(1);

    (
        SpeedSender {
            sender,
            slot: receiver.clone(),
        },
        SpeedReceiver {
            receiver,
            current: None,
        },
    )
}

#[derive(Debug)]
pub struct SpeedSender {
    sender: Sender<f32>,
    // Lets the sender evict an unread value to make room for a newer one.
    slot: Receiver<f32>,
}

impl SpeedSender {
    pub fn publish(&self, speed: f32) {
        if let Err(TrySendError::Full(speed)) = self.sender.try_send(speed) {
            let _ = self.slot.try_recv();
            // Only this sender fills the slot, so there is room now
            let _ = self.sender.try_send(speed);
        }
    }
}

#[derive(Debug)]
pub struct SpeedReceiver {
    receiver: Receiver<f32>,
    current: Option<f32>,
}

impl SpeedReceiver {
    /// Returns the most recently published speed.
    ///
    /// Blocks until the first speed has been published. Returns `None` if the
    /// sender went away before publishing anything.
    pub fn latest(&mut self) -> Option<f32> {
        self.process_messages();

        if self.current.is_none() {
            self.current = self.receiver.recv().ok();
        }

        self.current
    }

    fn process_messages(&mut self) {
        while let Ok(speed) = self.receiver.try_recv() {
            self.current = Some(speed);
        }
    }
}
