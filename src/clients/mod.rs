pub mod llm_client;

pub use llm_client::{
    ChatTransport, DefaultTransportFactory, HttpChatClient, OpenAiCompatClient, TransportFactory,
};
