//! Pending image attachments for the next outgoing message.
//!
//! The [`AttachmentManager`] holds up to `capacity` images in the order the
//! user selected them. Adding files is split in two so an event loop can run
//! the slow part elsewhere: [`AttachmentManager::reserve`] validates and
//! claims slots synchronously, and [`AttachmentManager::complete`] fills a
//! slot once its decode finishes. [`AttachmentManager::add_files`] does both
//! for callers that can await the whole batch.
//!
//! ```
//! use tilechat_attach::{AttachmentManager, AttachmentState, FileHandle};
//! use tilechat_common::ChatError;
//!
//! let mut manager = AttachmentManager::new(3, 10 * 1024 * 1024);
//! let files = vec![
//!     FileHandle::in_memory("plan.png", "image/png", vec![0u8; 16]),
//!     FileHandle::in_memory("notes.txt", "text/plain", b"hi".to_vec()),
//! ];
//! let reservation = manager.reserve(files);
//!
//! assert_eq!(reservation.accepted.len(), 1);
//! assert!(matches!(reservation.rejected[0], ChatError::InvalidFileType { .. }));
//! assert_eq!(manager.state(), AttachmentState::Pending(1));
//! ```

mod file;
mod manager;

pub use file::{FileHandle, FileSource, FsImageReader, ImageReader};
pub use manager::{
    AddReport, AttachmentManager, AttachmentState, Completion, Reservation, Ticket,
};
