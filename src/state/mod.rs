mod conversation;

pub use conversation::{Conversation, SharedConversation};
