pub mod copy;
pub mod models;
pub mod pricing;
pub mod publish;
pub mod transform;

pub use copy::{CopyError, ListingCopy, generate_copy};
pub use models::{ListingDraft, ListingPatch, ScrapedProduct, SizeStock};
pub use publish::{PublishError, PublishResponse, publish};
