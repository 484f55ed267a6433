// Advisor prompt templates. All prompts for the advisor glue live here;
// the core (merge, fit, search, credits) never builds a prompt.

/// System prompt for counselor question answering.
pub const ADVISOR_SYSTEM: &str = "\
You are a college admissions counselor assistant. \
Answer questions using ONLY the knowledge-base excerpts and student profile \
provided in the prompt. If the context does not contain the answer, say so \
plainly — never invent statistics, deadlines, or acceptance rates. \
You MUST respond with valid JSON only — no markdown fences, no explanations.";

pub const ADVISOR_ANSWER_PROMPT: &str = r#"Answer the student's question using the context below.

QUESTION:
{question}

STUDENT PROFILE:
{profile}

KNOWLEDGE BASE EXCERPTS:
{context}

OUTPUT SCHEMA (return exactly this structure):
{
  "answer": "string — a direct, specific answer grounded in the excerpts",
  "sources": ["string — the id of each excerpt the answer relies on"]
}"#;

/// Fills the answer prompt. Placeholders are replaced literally, in the
/// same way the template strings expect them.
pub fn build_answer_prompt(question: &str, profile: &str, context: &str) -> String {
    ADVISOR_ANSWER_PROMPT
        .replace("{question}", question)
        .replace("{profile}", profile)
        .replace("{context}", context)
}
