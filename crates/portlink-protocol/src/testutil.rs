/*!
 * Test support: a scripted mock device.
 *
 * Requests are matched by their full payload; a scripted reply is
 * enqueued on the same channel the request was sent on, which is
 * exactly how a well-behaved device correlates replies.
 */
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use portlink_core::message::Message;
use portlink_device::device::{DeviceInfo, MessageDevice};
use portlink_device::queue::MessageQueue;

#[derive(Debug, Default)]
pub(crate) struct MockDevice {
    connected: AtomicBool,
    queue: MessageQueue,
    sent: Mutex<Vec<Message>>,
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    errors: Mutex<Vec<(i32, Option<String>)>>,
    debugs: Mutex<Vec<String>>,
    refreshes: Mutex<Vec<Vec<String>>>,
    reconfigures: AtomicUsize,
    disconnects: AtomicUsize,
    device_info: Mutex<Option<DeviceInfo>>,
}

impl MockDevice {
    pub(crate) fn new() -> Arc<Self> {
        let device = Self::default();
        device.connected.store(true, Ordering::SeqCst);
        Arc::new(device)
    }

    /// Script a reply payload for a request payload. Multiple replies
    /// for the same request are served in order.
    pub(crate) fn script(&self, request: &str, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(request.to_string())
            .or_default()
            .push_back(reply.to_string());
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn sent_payloads(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload().to_string())
            .collect()
    }

    pub(crate) fn sent_count_with_prefix(&self, prefix: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.payload().starts_with(prefix))
            .count()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub(crate) fn errors(&self) -> Vec<(i32, Option<String>)> {
        self.errors.lock().unwrap().clone()
    }

    pub(crate) fn debugs(&self) -> Vec<String> {
        self.debugs.lock().unwrap().clone()
    }

    pub(crate) fn refreshes(&self) -> Vec<Vec<String>> {
        self.refreshes.lock().unwrap().clone()
    }

    pub(crate) fn reconfigure_count(&self) -> usize {
        self.reconfigures.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn stored_device_info(&self) -> Option<DeviceInfo> {
        self.device_info.lock().unwrap().clone()
    }
}

impl MessageDevice for MockDevice {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: Message) {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(message.payload())
            .and_then(VecDeque::pop_front);
        if let Some(reply) = reply {
            self.queue.push(Message::new(message.channel(), reply));
        }
        self.sent.lock().unwrap().push(message);
    }

    fn input_messages(&self) -> &MessageQueue {
        &self.queue
    }

    fn set_error(&self, code: i32, message: Option<String>) {
        self.errors.lock().unwrap().push((code, message));
    }

    fn disconnect_device(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn received_debug(&self, message: String) {
        self.debugs.lock().unwrap().push(message);
    }

    fn received_refresh(&self, port_ids: Vec<String>) {
        self.refreshes.lock().unwrap().push(port_ids);
    }

    fn received_reconfigure(&self) {
        self.reconfigures.fetch_add(1, Ordering::SeqCst);
    }

    fn set_device_info(&self, info: DeviceInfo) {
        *self.device_info.lock().unwrap() = Some(info);
    }
}
