//! Prompt rendering for the generation service

use crate::context::bundle::ContextBundle;
use crate::intent::models::ClassifiedQuery;

/// Render a classified query and its context bundle into the generation
/// prompt. The context travels as pretty-printed JSON; every timestamp in it
/// is already an RFC 3339 string.
pub fn render_query_prompt(classified: &ClassifiedQuery, bundle: &ContextBundle) -> String {
    let payload = bundle.to_payload(&classified.entities);
    let context_json =
        serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Answer the query: '{query}'.\n\
         This is a {intent} query (confidence {confidence:.0}%).\n\
         Use only the context below; it contains live ops changes, metric \
         measurements, and domain notes for our gaming product. Flag any \
         listed gaps as caveats instead of guessing.\n\n\
         Context:\n{context}",
        query = classified.raw_text,
        intent = classified.intent_id,
        confidence = classified.confidence * 100.0,
        context = context_json,
    )
}
