//! Response Synthesizer
//!
//! Zero accepted entries yields `NoInformation`, one is passed through
//! verbatim, two or more are blended by a single model call.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Answer, Workpad};
use crate::agent::{prompts, ModelInvoker, TokenSink};
use crate::utils::{truncate_text, TruncationPolicy};

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    agent: &'a str,
    response: String,
}

#[derive(Clone)]
pub struct Synthesizer {
    invoker: ModelInvoker,
    per_agent_budget: TruncationPolicy,
}

impl Synthesizer {
    pub fn new(invoker: ModelInvoker) -> Self {
        Self {
            invoker,
            per_agent_budget: TruncationPolicy::Tokens(1500),
        }
    }

    pub fn with_per_agent_budget(mut self, budget: TruncationPolicy) -> Self {
        self.per_agent_budget = budget;
        self
    }

    /// Build the blend prompt: the query and every entry in workpad order.
    pub fn build_prompt(&self, query: &str, workpad: &Workpad) -> serde_json::Result<String> {
        let inputs: Vec<SynthesisInput> = workpad
            .entries()
            .iter()
            .map(|e| SynthesisInput {
                agent: &e.agent,
                response: truncate_text(&e.content, self.per_agent_budget),
            })
            .collect();
        let responses = serde_json::to_string_pretty(&inputs)?;
        Ok(prompts::synthesis_prompt(query, &responses))
    }

    /// Never fails; synthesis problems come back as `Answer::SynthesisFailed`.
    pub async fn synthesize(&self, query: &str, workpad: &Workpad, sink: Option<&dyn TokenSink>) -> Answer {
        match workpad.entries() {
            [] => {
                info!("No accepted agent output to synthesize");
                Answer::NoInformation
            }
            [only] => {
                debug!("Single accepted output from '{}'; passing through", only.agent);
                Answer::PassThrough {
                    agent: only.agent.clone(),
                    text: only.content.clone(),
                }
            }
            entries => {
                let agents: Vec<String> = entries.iter().map(|e| e.agent.clone()).collect();
                info!("Synthesizing {} agent outputs: {:?}", entries.len(), agents);

                let prompt = match self.build_prompt(query, workpad) {
                    Ok(p) => p,
                    Err(e) => return Answer::synthesis_failed(format!("could not encode agent responses: {}", e)),
                };

                match self.invoker.invoke(prompt, sink).await {
                    Ok(text) if text.trim().is_empty() => {
                        warn!("Synthesis returned an empty answer");
                        Answer::synthesis_failed("synthesis produced an empty answer")
                    }
                    Ok(text) => Answer::Synthesized { agents, text },
                    Err(e) => {
                        warn!("Synthesis failed: {:#}", e);
                        Answer::synthesis_failed(format!("synthesis failed: {:#}", e))
                    }
                }
            }
        }
    }
}
