/// Separates the instructions from the data in every prompt.
pub const INPUT_MARKER: &str = "INPUT:\n";

const FORMAT_RULES: &str = "\
- Keep every placeholder, variable, escape code and tag exactly as written \
(for example {0}, %1, \\V[1], \\N[2], <br>, [b]).
- Do not add explanations, notes, quotes or a preamble.
- Keep line breaks that appear inside an item.";

const BATCH_RULES: &str = "\
- Answer with a numbered list: one numbered line for every numbered input item, \
in the same order, keeping the same numbers.
- Never merge, split, add or drop items.
- If an item is empty, answer with its number followed by nothing.";

pub struct PromptSpec<'a> {
    pub target_language: &'a str,
    pub style: &'a str,
    pub context: Option<&'a str>,
}

impl PromptSpec<'_> {
    fn header(&self, out: &mut String) {
        out.push_str(&format!(
            "Translate the following text into {}.\n",
            self.target_language
        ));

        let style = self.style.trim();
        if !style.is_empty() {
            out.push_str(&format!("Style: {style}\n"));
        }

        if let Some(ctx) = self.context.map(str::trim).filter(|c| !c.is_empty()) {
            out.push_str(&format!("Context: {ctx}\n"));
        }

        out.push_str("\nRules:\n");
        out.push_str(FORMAT_RULES);
        out.push('\n');
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn batch_prompt(spec: &PromptSpec, items: &[String]) -> String {
    let mut p = String::new();
    spec.header(&mut p);
    p.push_str(BATCH_RULES);
    p.push_str(&format!(
        "\n\nThere are exactly {} items.\n\n{INPUT_MARKER}",
        items.len()
    ));
    p.push_str(&numbered(items));
    p
}

/// Re-prompt used once after the model returned the wrong number of items.
pub fn strict_batch_prompt(spec: &PromptSpec, items: &[String], got: usize) -> String {
    let mut p = String::new();
    spec.header(&mut p);
    p.push_str(BATCH_RULES);
    p.push_str(&format!(
        "\n\nIMPORTANT: your previous answer contained {got} items but exactly {n} are required. \
Return exactly {n} numbered lines, numbered 1 to {n}, and nothing else.\n\n{INPUT_MARKER}",
        n = items.len()
    ));
    p.push_str(&numbered(items));
    p
}

pub fn single_prompt(spec: &PromptSpec, text: &str) -> String {
    let mut p = String::new();
    spec.header(&mut p);
    p.push_str("- Answer with the translation only.\n\n");
    p.push_str(INPUT_MARKER);
    p.push_str(text);
    p
}
