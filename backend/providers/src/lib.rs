pub mod extract;
pub mod mock;
pub mod openai;
pub mod sse;

pub use extract::{clean_response_text, extract_generated_text};
pub use mock::MockProvider;
pub use openai::{
    regional_base_url, OpenAiCompatibleProvider, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};
pub use sse::{
    consume_completion_stream, consume_gateway_stream, StreamedReply, GATEWAY_END,
    GATEWAY_ERROR_EVENT,
};
