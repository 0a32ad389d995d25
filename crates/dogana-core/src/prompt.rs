//! Model prompts and context assembly.

use dogana_llm::Message;

use crate::evidence::EvidenceRow;

/// Interpretive prompt: answer from the context only, cite articles, never
/// produce a sources section.
pub const SYSTEM_PROMPT: &str = "Usa esclusivamente le informazioni presenti nel CONTESTO.

Se la risposta non è presente, scrivi:
\"Informazione non presente nel contesto fornito.\"

Fornisci:

1. Risposta sintetica
2. Articoli rilevanti (se presenti)
3. Ambito di applicazione (se disponibile)
4. Note o eccezioni (se presenti)

Cita sempre gli articoli quando disponibili.
Non aggiungere una sezione di fonti o riferimenti normativi: le fonti sono fornite separatamente.";

/// Verbatim prompt for evidence obtained by code lookup.
pub const TRANSCRIPTION_PROMPT: &str = "Usa esclusivamente le informazioni presenti nel CONTESTO.

Il CONTESTO contiene voci normative estratte per codice. Trascrivile fedelmente,
nello stesso ordine e con la stessa indentazione, senza riassumere, interpretare
o aggiungere informazioni.

Se il CONTESTO è vuoto, scrivi:
\"Informazione non presente nel contesto fornito.\"

Non aggiungere una sezione di fonti o riferimenti normativi: le fonti sono fornite separatamente.";

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Join evidence rows into one context string of numbered `[Chunk i]` blocks.
#[must_use]
pub fn format_context(rows: &[EvidenceRow]) -> String {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut block = vec![format!("[Chunk {}]", i + 1)];
            if let Some(title) = row.metadata_text("title") {
                block.push(format!("Titolo: {title}"));
            }
            if let Some(article) = row
                .metadata_text("article_number")
                .or_else(|| row.metadata_text("article"))
            {
                block.push(format!("Articolo: {article}"));
            }
            if !row.text.is_empty() {
                block.push(row.text.clone());
            }
            if let Some(url) = row.metadata_text("source_url") {
                block.push(format!("Fonte: {url}"));
            }
            block.join("\n")
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// System and user messages for one answer. `verbatim` selects
/// [`TRANSCRIPTION_PROMPT`].
#[must_use]
pub fn build_messages(question: &str, context: &str, verbatim: bool) -> Vec<Message> {
    let system = if verbatim {
        TRANSCRIPTION_PROMPT
    } else {
        SYSTEM_PROMPT
    };
    vec![
        Message::system(system),
        Message::user(format!("CONTESTO:\n\n{context}\n\nDOMANDA: {question}")),
    ]
}
