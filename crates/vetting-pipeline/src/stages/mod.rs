//! The four validation stages and the streaming adapter they share.

pub mod collection;
pub mod single;
pub mod stream_collection;
pub mod stream_single;
pub mod validated_stream;

pub use collection::CollectionValidationBehavior;
pub use single::ValidationBehavior;
pub use stream_collection::CollectionStreamValidationBehavior;
pub use stream_single::StreamValidationBehavior;
pub use validated_stream::ValidatedStream;
