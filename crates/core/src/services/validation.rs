//! Custom field validators shared by service inputs.

use pulse_db::entities::message::MessageType;
use validator::ValidationError;

/// Reject strings that are empty after trimming.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be empty".into()));
    }
    Ok(())
}

/// Reject message kinds a client may not pick. Story replies only come from a story.
pub fn client_message_type(kind: &MessageType) -> Result<(), ValidationError> {
    if *kind == MessageType::StoryReply {
        return Err(ValidationError::new("message_type")
            .with_message("story replies must be sent from the story".into()));
    }
    Ok(())
}
