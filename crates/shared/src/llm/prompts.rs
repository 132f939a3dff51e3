use crate::models::KnowledgeFile;

const KNOWLEDGE_HEADER: &str = "[knowledge]";
const QUESTION_HEADER: &str = "[question]";

/// Prepends attached knowledge documents to the user's question. Each document
/// sits under its own file-name label, in attachment order, so the model can
/// attribute context to a source. With no documents the prompt passes through
/// unchanged.
pub fn compose_prompt(knowledge: &[KnowledgeFile], prompt: &str) -> String {
    if knowledge.is_empty() {
        return prompt.to_string();
    }

    let mut composed = String::new();
    composed.push_str(KNOWLEDGE_HEADER);
    composed.push('\n');
    for file in knowledge {
        composed.push_str(&format!("--- {} ---\n", file.name));
        composed.push_str(&file.content);
        if !file.content.ends_with('\n') {
            composed.push('\n');
        }
    }
    composed.push('\n');
    composed.push_str(QUESTION_HEADER);
    composed.push('\n');
    composed.push_str(prompt);
    composed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content: &str) -> KnowledgeFile {
        KnowledgeFile {
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn empty_knowledge_passes_prompt_through_unchanged() {
        assert_eq!(compose_prompt(&[], "Hello"), "Hello");
    }

    #[test]
    fn knowledge_precedes_question_in_attachment_order() {
        let composed = compose_prompt(&[file("a.txt", "foo"), file("b.txt", "bar")], "Q");

        let a_label = composed.find("--- a.txt ---").expect("a.txt label");
        let b_label = composed.find("--- b.txt ---").expect("b.txt label");
        let foo = composed.find("foo").expect("foo content");
        let bar = composed.find("bar").expect("bar content");
        let question = composed.find("[question]").expect("question header");
        let q = composed.rfind("Q").expect("question text");

        assert!(a_label < foo);
        assert!(foo < b_label);
        assert!(b_label < bar);
        assert!(bar < question);
        assert!(question < q);
    }

    #[test]
    fn labels_are_distinguishable_per_file() {
        let composed = compose_prompt(&[file("notes.md", "alpha")], "what?");
        assert!(composed.contains("--- notes.md ---"));
        assert!(composed.starts_with("[knowledge]"));
    }
}
