use std::collections::BTreeMap;
use std::sync::Arc;

use tilechat_common::{ChatError, ImageRef, Result};
use tokio::task::JoinSet;

use crate::file::{FileHandle, ImageReader};

/// Identifies a reserved slot between selection and decode completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
enum Slot {
    Reserved { ticket: Ticket, name: String },
    Ready(ImageRef),
}

impl Slot {
    fn image(&self) -> Option<&ImageRef> {
        match self {
            Slot::Ready(image) => Some(image),
            Slot::Reserved { .. } => None,
        }
    }
}

/// Outcome of the synchronous half of adding files.
#[derive(Debug, Default)]
pub struct Reservation {
    /// Files that passed validation, each holding a slot in selection order.
    pub accepted: Vec<(Ticket, FileHandle)>,
    /// One error per rejected file, naming it.
    pub rejected: Vec<ChatError>,
}

/// What happened to a decode result handed to [`AttachmentManager::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Attached { name: String },
    Failed(ChatError),
    /// The slot was cleared before the decode finished.
    Discarded,
}

/// Summary of an [`AttachmentManager::add_files`] batch.
#[derive(Debug, Default)]
pub struct AddReport {
    pub attached: Vec<String>,
    pub rejected: Vec<ChatError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Empty,
    Pending(usize),
    Full,
}

/// Ordered, bounded set of images waiting to be sent.
///
/// A slot is reserved for every accepted file before its decode starts, so
/// the visible order always equals selection order. Reserved and decoded
/// slots both count against capacity.
#[derive(Debug)]
pub struct AttachmentManager {
    slots: Vec<Slot>,
    capacity: usize,
    max_file_bytes: u64,
    next_ticket: u64,
}

impl Default for AttachmentManager {
    fn default() -> Self {
        Self::new(
            tilechat_common::DEFAULT_ATTACHMENT_CAPACITY,
            tilechat_common::MAX_IMAGE_BYTES,
        )
    }
}

impl AttachmentManager {
    pub fn new(capacity: usize, max_file_bytes: u64) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            max_file_bytes,
            next_ticket: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of decoded, visible attachments.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.image().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes that have been reserved but not completed.
    pub fn in_flight(&self) -> usize {
        self.slots.len() - self.len()
    }

    /// Slots in use, decoded or not.
    pub fn occupied(&self) -> usize {
        self.slots.len()
    }

    pub fn state(&self) -> AttachmentState {
        match self.slots.len() {
            0 => AttachmentState::Empty,
            n if n >= self.capacity => AttachmentState::Full,
            n => AttachmentState::Pending(n),
        }
    }

    /// Validate `files` in order and reserve a slot for each one that fits.
    ///
    /// Type is checked before size, size before capacity. Rejections never
    /// abort the rest of the batch.
    pub fn reserve(&mut self, files: Vec<FileHandle>) -> Reservation {
        let mut reservation = Reservation::default();
        for file in files {
            if !file.content_type.starts_with("image/") {
                reservation.rejected.push(ChatError::InvalidFileType {
                    name: file.name,
                    content_type: file.content_type,
                });
                continue;
            }
            if file.size > self.max_file_bytes {
                reservation.rejected.push(ChatError::FileTooLarge {
                    name: file.name,
                    size: file.size,
                    limit: self.max_file_bytes,
                });
                continue;
            }
            if self.slots.len() >= self.capacity {
                reservation.rejected.push(ChatError::CapacityExceeded {
                    name: file.name,
                    capacity: self.capacity,
                });
                continue;
            }

            let ticket = Ticket(self.next_ticket);
            self.next_ticket += 1;
            self.slots.push(Slot::Reserved {
                ticket,
                name: file.name.clone(),
            });
            reservation.accepted.push((ticket, file));
        }

        for err in &reservation.rejected {
            tracing::info!(error = %err, "attachment rejected");
        }
        tracing::debug!(
            accepted = reservation.accepted.len(),
            rejected = reservation.rejected.len(),
            occupied = self.slots.len(),
            "attachment slots reserved"
        );
        reservation
    }

    /// Fill (or release) the slot reserved under `ticket`.
    pub fn complete(&mut self, ticket: Ticket, result: Result<ImageRef>) -> Completion {
        let Some(index) = self
            .slots
            .iter()
            .position(|s| matches!(s, Slot::Reserved { ticket: t, .. } if *t == ticket))
        else {
            tracing::debug!(?ticket, "decode finished for a released slot");
            return Completion::Discarded;
        };

        match result {
            Err(err) => {
                self.slots.remove(index);
                tracing::warn!(error = %err, "attachment decode failed");
                Completion::Failed(err)
            }
            Ok(image) => {
                if self.len() >= self.capacity {
                    let name = image.name().to_string();
                    self.slots.remove(index);
                    tracing::warn!(file = %name, "attachment over capacity at completion");
                    return Completion::Failed(ChatError::CapacityExceeded {
                        name,
                        capacity: self.capacity,
                    });
                }
                let name = image.name().to_string();
                self.slots[index] = Slot::Ready(image);
                tracing::debug!(file = %name, position = index, "attachment ready");
                Completion::Attached { name }
            }
        }
    }

    /// Remove the visible attachment at `index`, or everything (including
    /// in-flight reservations) when `index` is `None`. Out-of-range indices
    /// are ignored. Returns the removed images.
    pub fn remove_at(&mut self, index: Option<usize>) -> Vec<ImageRef> {
        match index {
            None => self.drain(),
            Some(index) => {
                let Some(position) = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.image().is_some())
                    .nth(index)
                    .map(|(pos, _)| pos)
                else {
                    return Vec::new();
                };
                match self.slots.remove(position) {
                    Slot::Ready(image) => {
                        tracing::debug!(file = %image.name(), index, "attachment removed");
                        vec![image]
                    }
                    Slot::Reserved { .. } => Vec::new(),
                }
            }
        }
    }

    /// Decoded attachments in selection order.
    pub fn snapshot(&self) -> Vec<ImageRef> {
        self.slots.iter().filter_map(Slot::image).cloned().collect()
    }

    /// Names of reservations still decoding, in selection order.
    pub fn pending_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Reserved { name, .. } => Some(name.as_str()),
                Slot::Ready(_) => None,
            })
            .collect()
    }

    /// Hand the decoded attachments to a send.
    ///
    /// Reservations still decoding keep their slots and order, so they ride
    /// along with the next message once they land.
    pub fn take_for_send(&mut self) -> Vec<ImageRef> {
        let mut images = Vec::new();
        self.slots.retain_mut(|slot| match slot {
            Slot::Reserved { .. } => true,
            Slot::Ready(image) => {
                images.push(image.clone());
                false
            }
        });
        if !images.is_empty() {
            tracing::debug!(
                count = images.len(),
                in_flight = self.slots.len(),
                "attachments taken for send"
            );
        }
        images
    }

    fn drain(&mut self) -> Vec<ImageRef> {
        let dropped = self.in_flight();
        if dropped > 0 {
            tracing::debug!(dropped, "in-flight attachment decodes released");
        }
        self.slots
            .drain(..)
            .filter_map(|s| match s {
                Slot::Ready(image) => Some(image),
                Slot::Reserved { .. } => None,
            })
            .collect()
    }

    /// Reserve, decode concurrently, and complete a batch of files.
    ///
    /// Decodes run as separate tasks and may finish in any order; each result
    /// lands in the slot reserved for its file.
    pub async fn add_files(
        &mut self,
        files: Vec<FileHandle>,
        reader: Arc<dyn ImageReader>,
    ) -> AddReport {
        let Reservation { accepted, rejected } = self.reserve(files);
        let mut report = AddReport {
            attached: Vec::new(),
            rejected,
        };

        let mut outstanding: BTreeMap<Ticket, String> = BTreeMap::new();
        let mut join_set: JoinSet<(Ticket, Result<ImageRef>)> = JoinSet::new();
        for (ticket, file) in accepted {
            outstanding.insert(ticket, file.name.clone());
            let reader = Arc::clone(&reader);
            join_set.spawn(async move {
                let result = reader.read(&file).await;
                (ticket, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((ticket, result)) => {
                    outstanding.remove(&ticket);
                    self.record(ticket, result, &mut report);
                }
                Err(e) => tracing::error!(error = %e, "attachment decode task failed"),
            }
        }

        // Tasks that panicked never reported back; free their slots.
        for (ticket, name) in outstanding {
            let err = ChatError::FileReadError {
                name,
                reason: "decode task did not finish".into(),
            };
            self.record(ticket, Err(err), &mut report);
        }

        report
    }

    fn record(&mut self, ticket: Ticket, result: Result<ImageRef>, report: &mut AddReport) {
        match self.complete(ticket, result) {
            Completion::Attached { name } => report.attached.push(name),
            Completion::Failed(err) => report.rejected.push(err),
            Completion::Discarded => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> FileHandle {
        FileHandle::in_memory(name, "image/png", vec![1u8, 2, 3])
    }

    fn decoded(file: &FileHandle) -> ImageRef {
        ImageRef::new(file.name.clone(), vec![1u8, 2, 3], file.content_type.clone())
    }

    fn names(images: &[ImageRef]) -> Vec<&str> {
        images.iter().map(ImageRef::name).collect()
    }

    #[test]
    fn validation_order_is_type_then_size_then_capacity() {
        let mut m = AttachmentManager::new(1, 10);
        let big_text = FileHandle::new(
            "a.txt",
            "text/plain",
            99,
            crate::FileSource::Memory(Default::default()),
        );
        let big_image = FileHandle::new(
            "b.png",
            "image/png",
            99,
            crate::FileSource::Memory(Default::default()),
        );
        let r = m.reserve(vec![big_text, big_image, image("c.png"), image("d.png")]);

        assert_eq!(r.accepted.len(), 1);
        assert!(matches!(r.rejected[0], ChatError::InvalidFileType { .. }));
        assert!(matches!(r.rejected[1], ChatError::FileTooLarge { .. }));
        assert!(matches!(
            r.rejected[2],
            ChatError::CapacityExceeded { ref name, .. } if name == "d.png"
        ));
    }

    #[test]
    fn out_of_order_completion_keeps_selection_order() {
        let mut m = AttachmentManager::new(3, 1024);
        let r = m.reserve(vec![image("1.png"), image("2.png"), image("3.png")]);
        assert_eq!(m.state(), AttachmentState::Full);
        assert!(m.snapshot().is_empty());

        for (ticket, file) in r.accepted.iter().rev() {
            m.complete(*ticket, Ok(decoded(file)));
        }
        assert_eq!(names(&m.snapshot()), ["1.png", "2.png", "3.png"]);
        assert_eq!(m.in_flight(), 0);
    }

    #[test]
    fn failed_decode_frees_its_slot() {
        let mut m = AttachmentManager::new(2, 1024);
        let r = m.reserve(vec![image("a.png"), image("b.png")]);
        let (t0, _) = &r.accepted[0];
        let (t1, f1) = &r.accepted[1];

        let err = ChatError::FileReadError {
            name: "a.png".into(),
            reason: "truncated".into(),
        };
        assert_eq!(m.complete(*t0, Err(err.clone())), Completion::Failed(err));
        m.complete(*t1, Ok(decoded(f1)));
        assert_eq!(m.state(), AttachmentState::Pending(1));
        assert_eq!(names(&m.snapshot()), ["b.png"]);
    }

    #[test]
    fn completion_after_clear_is_discarded() {
        let mut m = AttachmentManager::new(3, 1024);
        let r = m.reserve(vec![image("a.png")]);
        m.remove_at(None);

        let (ticket, file) = &r.accepted[0];
        assert_eq!(m.complete(*ticket, Ok(decoded(file))), Completion::Discarded);
        assert!(m.snapshot().is_empty());
        assert_eq!(m.state(), AttachmentState::Empty);
    }

    #[test]
    fn completing_twice_is_discarded() {
        let mut m = AttachmentManager::new(3, 1024);
        let r = m.reserve(vec![image("a.png")]);
        let (ticket, file) = &r.accepted[0];
        assert!(matches!(
            m.complete(*ticket, Ok(decoded(file))),
            Completion::Attached { .. }
        ));
        assert_eq!(m.complete(*ticket, Ok(decoded(file))), Completion::Discarded);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_at_indexes_visible_entries() {
        let mut m = AttachmentManager::new(3, 1024);
        let r = m.reserve(vec![image("a.png"), image("b.png"), image("c.png")]);
        // b stays in flight; a and c are visible at 0 and 1.
        m.complete(r.accepted[0].0, Ok(decoded(&r.accepted[0].1)));
        m.complete(r.accepted[2].0, Ok(decoded(&r.accepted[2].1)));

        let removed = m.remove_at(Some(1));
        assert_eq!(names(&removed), ["c.png"]);
        assert_eq!(names(&m.snapshot()), ["a.png"]);
        assert_eq!(m.pending_names(), ["b.png"]);
    }

    #[test]
    fn send_keeps_in_flight_reservations_for_the_next_message() {
        let mut m = AttachmentManager::new(3, 1024);
        let r = m.reserve(vec![image("a.png"), image("b.png"), image("c.png")]);
        m.complete(r.accepted[1].0, Ok(decoded(&r.accepted[1].1)));

        assert_eq!(names(&m.take_for_send()), ["b.png"]);
        assert_eq!(m.pending_names(), ["a.png", "c.png"]);
        assert_eq!(m.state(), AttachmentState::Pending(2));

        m.complete(r.accepted[2].0, Ok(decoded(&r.accepted[2].1)));
        m.complete(r.accepted[0].0, Ok(decoded(&r.accepted[0].1)));
        assert_eq!(names(&m.take_for_send()), ["a.png", "c.png"]);
        assert_eq!(m.state(), AttachmentState::Empty);
    }

    #[test]
    fn remove_at_out_of_range_is_a_no_op() {
        let mut m = AttachmentManager::default();
        assert!(m.remove_at(Some(0)).is_empty());
        assert!(m.remove_at(None).is_empty());
        assert_eq!(m.state(), AttachmentState::Empty);
    }

    #[test]
    fn full_set_accepts_only_removals() {
        let mut m = AttachmentManager::new(1, 1024);
        let r = m.reserve(vec![image("a.png")]);
        m.complete(r.accepted[0].0, Ok(decoded(&r.accepted[0].1)));

        let again = m.reserve(vec![image("b.png")]);
        assert!(again.accepted.is_empty());
        m.remove_at(Some(0));
        assert_eq!(m.reserve(vec![image("b.png")]).accepted.len(), 1);
    }
}
