use std::fmt;

use uuid::Uuid;

// One ad placement for every block of this many human messages.
pub const USER_MESSAGES_PER_AD: usize = 3;

// Substituted assistant reply when the upstream exchange fails outright.
pub const FALLBACK_REPLY: &str =
    "Desculpe, tive um problema para responder agora. Pode tentar de novo?";

// Status line shown when the upstream exchange runs past its deadline.
pub const TIMEOUT_STATUS: &str = "A resposta demorou demais. Tente novamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

// Immutable once created; ordered by append time; never deleted within a
// session.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

// Synthetic transcript entry instructing the UI to render an advertisement
// instead of a message. Derived purely from the count of user messages.
#[derive(Debug, Clone)]
pub struct AdPlacement {
    pub id: String,
    pub position_index: u32,
}

impl AdPlacement {
    pub fn new(position_index: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            position_index,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Entry {
    Message(Message),
    Ad(AdPlacement),
}

impl Entry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message(message) => Some(message),
            Entry::Ad(_) => None,
        }
    }

    pub fn as_ad(&self) -> Option<&AdPlacement> {
        match self {
            Entry::Ad(placement) => Some(placement),
            Entry::Message(_) => None,
        }
    }
}

// Role/text pair shipped to the upstream completion endpoint.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    // Input was empty or whitespace-only.
    Empty,
    // A prior exchange is still outstanding.
    Busy,
}

impl SendRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendRejection::Empty => "empty",
            SendRejection::Busy => "busy",
        }
    }
}

#[derive(Debug)]
pub enum ExchangeOutcome {
    Reply(String),
    Failed,
    TimedOut,
}

// The conversation accountant: the ordered transcript plus the rules for
// admitting sends and interleaving ad placements.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<Entry>,
    in_flight: bool,
    status: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn user_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(Entry::as_message)
            .filter(|message| message.role == Role::User)
            .count()
    }

    pub fn ad_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.as_ad().is_some()).count()
    }

    pub fn placements(&self) -> Vec<&AdPlacement> {
        self.entries.iter().filter_map(Entry::as_ad).collect()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    // Admits one human turn: appends the message, synthesizes an ad placement
    // when the new human count crosses a multiple of the cadence, and returns
    // the transcript snapshot to send upstream. Exactly one exchange may be
    // outstanding at a time.
    pub fn begin_exchange(&mut self, text: &str) -> Result<Vec<ChatTurn>, SendRejection> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::Empty);
        }
        if self.in_flight {
            return Err(SendRejection::Busy);
        }

        self.status = None;
        self.entries.push(Entry::Message(Message::user(text)));

        let count = self.user_count();
        if count % USER_MESSAGES_PER_AD == 0 {
            let index = (count / USER_MESSAGES_PER_AD) as u32;
            self.entries.push(Entry::Ad(AdPlacement::new(index)));
        }

        self.in_flight = true;
        Ok(self.chat_turns())
    }

    // Settles the outstanding exchange. Failures substitute the fixed apology
    // as the reply; timeouts leave the transcript alone and raise the status
    // line instead.
    pub fn complete_exchange(&mut self, outcome: ExchangeOutcome) {
        self.in_flight = false;
        match outcome {
            ExchangeOutcome::Reply(text) => {
                self.entries.push(Entry::Message(Message::assistant(text)));
            }
            ExchangeOutcome::Failed => {
                self.entries.push(Entry::Message(Message::assistant(FALLBACK_REPLY)));
            }
            ExchangeOutcome::TimedOut => {
                self.status = Some(TIMEOUT_STATUS.to_string());
            }
        }
    }

    fn chat_turns(&self) -> Vec<ChatTurn> {
        self.entries
            .iter()
            .filter_map(Entry::as_message)
            .map(|message| ChatTurn {
                role: message.role,
                text: message.text.clone(),
            })
            .collect()
    }
}

// The cadence rule on its own, for reconciling against an upstream-reported
// human message count.
pub fn placements_for_count(user_count: usize) -> usize {
    user_count / USER_MESSAGES_PER_AD
}
