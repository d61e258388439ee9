//! Record Store seam — typed records and the backend-agnostic trait.
//!
//! Persistence is owned entirely by the Record Store implementation; the
//! engine keeps no session cache beyond a single inbound-event call.

pub mod memory;
pub mod records;
pub mod traits;

pub use memory::MemoryStore;
pub use records::{
    Lead, LeadStatus, LeadUpdate, Meeting, MessageDirection, NewLead, NewMeeting, NewMessage,
    NewQualification, NewSession, OriginChannel, Qualification, QualificationUpdate, Session,
    SessionUpdate, StoredMessage,
};
pub use traits::RecordStore;
