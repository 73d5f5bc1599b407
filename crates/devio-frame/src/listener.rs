/// Passive observer of the byte spans a framer reads and writes.
///
/// Listeners see every span before the framer's own accounting runs, in
/// arrival order for reads and write order for writes. They must not
/// reach back into the framer they observe.
pub trait IoListener {
    /// Called with every span read from the stream.
    fn on_read(&mut self, data: &[u8]);

    /// Called with every span successfully written to the stream.
    fn on_write(&mut self, data: &[u8]);
}

/// Handle identifying a registered listener.
///
/// Handles are issued by [`Framer::add_listener`](crate::Framer::add_listener)
/// and are never reused within one framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Owning registry of listeners, keyed by identity.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<(ListenerId, Box<dyn IoListener>)>,
    next_id: u64,
}

impl ListenerSet {
    pub(crate) fn add(&mut self, listener: Box<dyn IoListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> Option<Box<dyn IoListener>> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    pub(crate) fn notify_read(&mut self, data: &[u8]) {
        for (_, listener) in &mut self.entries {
            listener.on_read(data);
        }
    }

    pub(crate) fn notify_write(&mut self, data: &[u8]) {
        for (_, listener) in &mut self.entries {
            listener.on_write(data);
        }
    }
}
