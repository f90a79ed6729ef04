//! [`AgentHandle`]: the per-scenario conversation handle a scenario body
//! drives.

use fabrik_types::{AgentResponse, ChatMessage, Role, Turn};

use crate::adapter::{AdapterContext, HttpAdapter};

/// Wraps one adapter plus the accumulated conversation for one scenario
/// run. `send` appends a persona turn, invokes the adapter with the full
/// context, appends the agent's reply (including latency), and returns
/// the response.
pub struct AgentHandle<'a> {
    adapter: &'a HttpAdapter,
    context: AdapterContext,
    pub turns: Vec<Turn>,
}

impl<'a> AgentHandle<'a> {
    pub fn new(adapter: &'a HttpAdapter) -> Self {
        Self {
            adapter,
            context: AdapterContext::default(),
            turns: Vec::new(),
        }
    }

    pub async fn send(&mut self, message: &str) -> Result<AgentResponse, crate::adapter::AdapterError> {
        self.turns.push(Turn::Persona {
            message: message.to_string(),
        });
        self.context.turns.push(ChatMessage {
            role: Role::User,
            content: message.to_string(),
        });

        let response = self.adapter.send(message, Some(&self.context)).await?;

        self.context.turns.push(ChatMessage {
            role: Role::Assistant,
            content: response.text.clone(),
        });
        self.turns.push(Turn::Agent {
            response: response.clone(),
        });
        Ok(response)
    }
}
