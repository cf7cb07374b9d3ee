use serde::{Deserialize, Serialize};

/// A role-tagged line of conversation used when assembling reasoner prompts.
///
/// The reasoner renders the run's trace into a transcript of messages before
/// flattening it into the completion backend's prompt text: a system
/// preamble (capability roster + decision grammar), the user's request, then
/// alternating assistant decisions and user-visible observations.
///
/// # Examples
///
/// ```
/// use reagent::message::Message;
///
/// let request = Message::user("find the user with the most orders");
/// let decision = Message::assistant(r#"{"thought": "...", "final_answer": "done"}"#);
/// assert!(request.has_role(Message::USER));
/// assert!(!decision.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Model response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System preamble message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Render this message as a single transcript line, `role: content`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }

    /// Flatten a slice of messages into prompt text, one rendered message per
    /// paragraph. This is the exact string handed to the completion backend.
    ///
    /// # Examples
    ///
    /// ```
    /// use reagent::message::Message;
    ///
    /// let transcript = Message::render_transcript(&[
    ///     Message::system("You decide the next action."),
    ///     Message::user("what is 2 + 2?"),
    /// ]);
    /// assert!(transcript.starts_with("system: You decide"));
    /// assert!(transcript.contains("\n\nuser: what is 2 + 2?"));
    /// ```
    #[must_use]
    pub fn render_transcript(messages: &[Message]) -> String {
        messages
            .iter()
            .map(Message::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
