//! 记忆层：人格对话线程、会话持久化、用户偏好

pub mod conversation;
pub mod persistence;
pub mod preferences;

pub use conversation::{Conversation, Message, PatchError, Role, FAILED_DIAGRAM};
pub use persistence::ConversationPersistence;
pub use preferences::{PreferenceStore, Preferences};
