pub mod dto;
pub mod queue;
pub mod render;
pub mod resend;
pub mod service;
pub mod worker;

pub use dto::{MailJob, Recipients};
pub use service::{MailerService, SendTemplatedEmail};
