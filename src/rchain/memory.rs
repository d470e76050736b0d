use crate::rchain::messages::Message;

/// Keeps every message of a conversation, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationBufferMemory {
    messages: Vec<Message>,
}

impl ConversationBufferMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::human(content));
    }

    pub fn add_ai_message(&mut self, content: impl Into<String>) {
        self.add_message(Message::ai(content));
    }

    /// Records one completed exchange.
    pub fn save_context(&mut self, input: &str, output: &str) {
        self.add_user_message(input);
        self.add_ai_message(output);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Transcript with one `Label: content` line per message.
    pub fn buffer_as_str(&self) -> String {
        self.messages
            .iter()
            .map(Message::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
