//! Prompt text for the generation pipeline.

/// System instruction shared by both report prompts.
pub const SYSTEM_INSTRUCTION: &str = "You are a senior industry analyst. You write accurate, \
well-structured analytical reports and answer only with JSON that matches the requested schema.";

/// Asks for search queries covering a topic, one per line.
pub fn topic_expansion(topic: &str) -> String {
    format!(
        "Break the research topic below into 3 to 5 specific search queries that together \
cover its most important aspects (market size, key players, trends, risks, outlook).\n\
Answer with one query per line and nothing else: no numbering, no bullets, no commentary.\n\n\
Topic: {topic}"
    )
}

/// Report prompt grounded on retrieved knowledge-base context.
pub fn context_report(topic: &str, context: &str) -> String {
    format!(
        "Write an in-depth analytical report on the topic below.\n\
Use the reference material where it is relevant and do not invent figures it contradicts.\n\n\
Topic: {topic}\n\n\
Reference material:\n{context}\n\n\
Structure the report as a title, an introduction, several sections and a conclusion."
    )
}

/// Report prompt following a user-supplied template.
///
/// The template text is embedded verbatim as formatting instructions.
pub fn template_report(topic: &str, template: &str, context: &str) -> String {
    format!(
        "Write an analytical report on the topic below, following the structure and \
formatting instructions of the template exactly.\n\n\
Topic: {topic}\n\n\
Template:\n{template}\n\n\
Supporting material:\n{context}\n\n\
Map the template's headings onto the report sections, keeping a title, an introduction \
and a conclusion."
    )
}
