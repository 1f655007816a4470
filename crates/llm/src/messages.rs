use serde::{Deserialize, Serialize};

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// OpenAI-compatible chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub stream: bool,
}

impl<'a> ChatRequest<'a> {
    /// A single-turn request carrying `prompt` as the user message.
    pub fn user(model: &'a str, prompt: &'a str, stream: bool) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        }
    }
}

/// Chat message in OpenAI format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// One streamed completion chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// The first choice's delta content, if it carries any text.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information, sent by some upstreams on the final chunk.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Classification of one line of an OpenAI-style event stream.
#[derive(Debug)]
pub enum DataLine {
    /// Blank, comment, non-`data:` or undecodable line.
    Ignored,
    /// The `data: [DONE]` terminator.
    Done,
    /// A decoded completion chunk.
    Chunk(ChatChunk),
}

/// Classifies a single line (without its trailing newline).
pub fn parse_data_line(line: &str) -> DataLine {
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return DataLine::Ignored;
    };

    if data.trim() == DONE_MARKER {
        return DataLine::Done;
    }

    match sonic_rs::from_str::<ChatChunk>(data) {
        Ok(chunk) => DataLine::Chunk(chunk),
        Err(e) => {
            log::debug!("Skipping undecodable upstream line: {e}");
            DataLine::Ignored
        }
    }
}
