//! Codec for the inline `<<name|quantity>>` ingredient markup embedded in
//! instruction text.
//!
//! This is the only "protocol" between generation output and its
//! consumers: the render pipeline splits instructions into tokens, the
//! speech path reads annotations out loud, and the illustration path
//! strips them down to bare ingredient names. All three transforms are
//! total: malformed or unterminated markup passes through as literal text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Non-greedy so adjacent annotations don't merge into one span.
    static ref ANNOTATION: Regex = Regex::new(r"<<(.+?)>>").expect("annotation regex is valid");
}

/// One token of a parsed instruction, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionToken {
    Text(String),
    Ingredient { name: String, quantity: String },
}

/// Split the annotation body on its first `|`. A span only counts as an
/// annotation when both halves are non-empty; anything else is plain text.
fn split_annotation(body: &str) -> Option<(&str, &str)> {
    let (name, quantity) = body.split_once('|')?;
    if name.is_empty() || quantity.is_empty() {
        return None;
    }
    Some((name, quantity))
}

/// Parse an instruction into literal-text and ingredient tokens for
/// rendering. Lossless over the visible text: joining the tokens back
/// together (ingredients by name) reproduces the instruction with markup
/// resolved.
pub fn parse_instruction(text: &str) -> Vec<InstructionToken> {
    let mut tokens = vec![];
    let mut cursor = 0;
    for matched in ANNOTATION.find_iter(text) {
        if matched.start() > cursor {
            tokens.push(InstructionToken::Text(text[cursor..matched.start()].into()));
        }
        let body = &text[matched.start() + 2..matched.end() - 2];
        match split_annotation(body) {
            Some((name, quantity)) => tokens.push(InstructionToken::Ingredient {
                name: name.into(),
                quantity: quantity.into(),
            }),
            // Degrade to the raw span, delimiters included
            None => tokens.push(InstructionToken::Text(matched.as_str().into())),
        }
        cursor = matched.end();
    }
    if cursor < text.len() {
        tokens.push(InstructionToken::Text(text[cursor..].into()));
    }
    tokens
}

fn replace_annotations(text: &str, mut render: impl FnMut(&str, &str) -> String) -> String {
    ANNOTATION
        .replace_all(text, |captures: &regex::Captures| {
            match split_annotation(&captures[1]) {
                Some((name, quantity)) => render(name, quantity),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrite annotations into the spoken phrase `"<quantity> of <name>"`.
/// Must run before any instruction text is sent for speech synthesis.
pub fn speech_text(text: &str) -> String {
    replace_annotations(text, |name, quantity| format!("{} of {}", quantity, name))
}

/// Reduce annotations to just the ingredient name. Used when building
/// "previous steps" context so image prompts never see the markup syntax.
pub fn strip_markup(text: &str) -> String {
    replace_annotations(text, |name, _| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through_all_transforms() {
        let text = "Bring a pot of water to a boil.";
        assert_eq!(
            parse_instruction(text),
            vec![InstructionToken::Text(text.into())]
        );
        assert_eq!(speech_text(text), text);
        assert_eq!(strip_markup(text), text);
    }

    #[test]
    fn annotations_tokenize_in_order() {
        let text = "Add <<sugar|1/2 cup>> and <<butter|2 tbsp>>, then stir.";
        assert_eq!(
            parse_instruction(text),
            vec![
                InstructionToken::Text("Add ".into()),
                InstructionToken::Ingredient {
                    name: "sugar".into(),
                    quantity: "1/2 cup".into()
                },
                InstructionToken::Text(" and ".into()),
                InstructionToken::Ingredient {
                    name: "butter".into(),
                    quantity: "2 tbsp".into()
                },
                InstructionToken::Text(", then stir.".into()),
            ]
        );
    }

    #[test]
    fn visible_text_round_trips_through_every_transform() {
        let text = "Sear <<chicken|500g>> in <<oil|1 tbsp>> until golden.";
        let rebuilt: String = parse_instruction(text)
            .into_iter()
            .map(|token| match token {
                InstructionToken::Text(t) => t,
                InstructionToken::Ingredient { name, .. } => name,
            })
            .collect();
        assert_eq!(rebuilt, "Sear chicken in oil until golden.");
        assert_eq!(strip_markup(text), rebuilt);
        assert_eq!(
            speech_text(text),
            "Sear 500g of chicken in 1 tbsp of oil until golden."
        );
    }

    #[test]
    fn unterminated_markup_is_inert() {
        let text = "Add <<sugar|1 cup and keep whisking";
        assert_eq!(
            parse_instruction(text),
            vec![InstructionToken::Text(text.into())]
        );
        assert_eq!(speech_text(text), text);
        assert_eq!(strip_markup(text), text);
    }

    #[test]
    fn empty_name_or_quantity_is_inert() {
        for text in ["Mix <<|1 cup>> in", "Mix <<sugar|>> in", "Mix <<sugar>> in"] {
            let tokens = parse_instruction(text);
            assert!(
                tokens
                    .iter()
                    .all(|t| matches!(t, InstructionToken::Text(_))),
                "expected {:?} to stay literal, got {:?}",
                text,
                tokens
            );
            let rebuilt: String = tokens
                .into_iter()
                .map(|t| match t {
                    InstructionToken::Text(t) => t,
                    InstructionToken::Ingredient { name, .. } => name,
                })
                .collect();
            assert_eq!(rebuilt, text);
            assert_eq!(speech_text(text), text);
            assert_eq!(strip_markup(text), text);
        }
    }

    #[test]
    fn quantity_keeps_everything_after_the_first_pipe() {
        assert_eq!(strip_markup("<<salt|1|2 tsp>>"), "salt");
        assert_eq!(speech_text("<<salt|1|2 tsp>>"), "1|2 tsp of salt");
    }
}
