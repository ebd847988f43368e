//! Message and Conversation domain types.
//!
//! The conversation is the single source of truth for model context:
//! an ordered, append-only log of role-tagged messages. Insertion order
//! equals chronological order equals model context order.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (identity, rules)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// A tool observation, named after the function that produced it
    Function,
}

/// A model-issued request to invoke a named function with structured
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to invoke
    pub name: String,

    /// Parsed arguments as a key → value mapping
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// A single message in a conversation.
///
/// `name` is present iff `role == Function`; `function_call` is only ever
/// carried by assistant messages, whose `content` is then `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content (null for an assistant function-call message)
    pub content: Option<String>,

    /// The function name, for function-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// A function call issued by the assistant, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    /// Create an assistant message carrying a function call. Content is
    /// null per the model-facing protocol.
    pub fn assistant_call(call: FunctionCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            name: None,
            function_call: Some(call),
        }
    }

    /// Create a function-role message carrying a tool observation.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }
}

/// An ordered message log forming the model context.
///
/// Invariants:
/// - index 0 is always the system message;
/// - the system message can only be replaced before the first user turn;
/// - a function-role message is immediately preceded by an assistant
///   message carrying a matching `function_call` (maintained by the
///   dispatch loop, checked by [`Conversation::check_invariants`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a conversation holding a single system message.
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system)],
        }
    }

    /// Replace the system message at index 0.
    ///
    /// Fails with [`ConfigError::SystemMessageLocked`] once any further
    /// message has been appended; the system prompt is fixed for the
    /// lifetime of a run.
    pub fn set_system_message(
        &mut self,
        content: impl Into<String>,
    ) -> Result<(), ConfigError> {
        if self.messages.len() > 1 {
            return Err(ConfigError::SystemMessageLocked);
        }
        self.messages[0] = Message::system(content);
        Ok(())
    }

    /// Append a message to the log.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Truncate back to the system message, ready for an independent
    /// conversation. Idempotent.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    /// The full ordered message log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// A conversation always holds at least the system message.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Verify the ordering invariants of the log. Used by tests and
    /// debug assertions in the dispatch loop.
    pub fn check_invariants(&self) -> bool {
        if self.messages.first().map(|m| m.role) != Some(Role::System) {
            return false;
        }
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.role == Role::Function {
                let Some(prev) = i.checked_sub(1).and_then(|j| self.messages.get(j)) else {
                    return false;
                };
                let matches = prev.role == Role::Assistant
                    && prev
                        .function_call
                        .as_ref()
                        .is_some_and(|fc| Some(&fc.name) == msg.name.as_ref());
                if !matches {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> FunctionCall {
        FunctionCall {
            name: name.into(),
            arguments: serde_json::Map::new(),
        }
    }

    #[test]
    fn new_conversation_has_system_message() {
        let conv = Conversation::new("You are a helpful AI assistant.");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
    }

    #[test]
    fn system_message_replaceable_before_first_turn() {
        let mut conv = Conversation::new("default");
        conv.set_system_message("Your name is Maestro.").unwrap();
        assert_eq!(
            conv.messages()[0].content.as_deref(),
            Some("Your name is Maestro.")
        );
    }

    #[test]
    fn system_message_locked_after_user_turn() {
        let mut conv = Conversation::new("default");
        conv.push(Message::user("hello"));
        let err = conv.set_system_message("too late").unwrap_err();
        assert_eq!(err, ConfigError::SystemMessageLocked);
        assert_eq!(conv.messages()[0].content.as_deref(), Some("default"));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut conv = Conversation::new("sys");
        conv.push(Message::user("a"));
        conv.push(Message::assistant("b"));

        conv.clear();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content.as_deref(), Some("sys"));

        conv.clear();
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn invariants_hold_for_call_result_pair() {
        let mut conv = Conversation::new("sys");
        conv.push(Message::user("what is 1+1"));
        conv.push(Message::assistant_call(call("calculator")));
        conv.push(Message::function_result("calculator", "2"));
        assert!(conv.check_invariants());
    }

    #[test]
    fn invariants_fail_for_orphan_function_message() {
        let mut conv = Conversation::new("sys");
        conv.push(Message::user("hi"));
        conv.push(Message::function_result("calculator", "2"));
        assert!(!conv.check_invariants());
    }

    #[test]
    fn invariants_fail_on_name_mismatch() {
        let mut conv = Conversation::new("sys");
        conv.push(Message::assistant_call(call("web_lookup")));
        conv.push(Message::function_result("calculator", "2"));
        assert!(!conv.check_invariants());
    }

    #[test]
    fn assistant_call_has_null_content() {
        let msg = Message::assistant_call(call("calculator"));
        assert!(msg.content.is_none());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""content":null"#));
        assert!(json.contains(r#""function_call""#));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::function_result("calculator", "2");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.name.as_deref(), Some("calculator"));
    }
}
