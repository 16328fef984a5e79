//! Prompt composition: retrieved context and the user's question in one template.

use crate::chunks::Chunk;

const QUESTION_SLOT: &str = "{question}";
const CONTEXT_SLOT: &str = "{context}";

/// Instruction-tuned template: answer from context only, admit ignorance, three sentences max.
pub const DEFAULT_TEMPLATE: &str = "<s> [INST] You are an assistant for question-answering tasks. \
Answer the question using only the following pieces of retrieved context. \
If the context does not contain the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise. [/INST] </s>
[INST] Question: {question}
Context: {context}
Answer: [/INST]";

/// A template with `{question}` and `{context}` slots.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Accepts a custom template; both slots must appear.
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        for slot in [QUESTION_SLOT, CONTEXT_SLOT] {
            if !template.contains(slot) {
                return Err(TemplateError::MissingSlot(slot));
            }
        }
        Ok(Self { template })
    }

    /// Fills the slots. Chunk texts are joined in the order given; no chunks means an
    /// empty context block.
    pub fn compose(&self, question: &str, context: &[Chunk]) -> String {
        let context = context
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.render(question, &context)
    }

    /// Single pass over the template, so slot markers inside the values stay literal.
    fn render(&self, question: &str, context: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("prompt template is missing the {0} slot")]
    MissingSlot(&'static str),
}
