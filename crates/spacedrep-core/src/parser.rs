//! TOML deck parser.
//!
//! Loads card decks from TOML files and directories, and validates them.
//!
//! ```toml
//! [deck]
//! subject = "Biology"
//! source = "cell-biology.pdf"
//!
//! [[cards]]
//! kind = "multiple_choice"
//! question = "Which organelle produces ATP?"
//! answer = "Mitochondria"
//! options = ["Ribosome", "Mitochondria", "Golgi apparatus"]
//! page = 12
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{CardKind, CardSource, NewCard, SubjectId};

/// Intermediate TOML structure for parsing deck files.
#[derive(Debug, Deserialize)]
struct TomlDeckFile {
    deck: TomlDeckHeader,
    #[serde(default)]
    cards: Vec<TomlCard>,
}

#[derive(Debug, Deserialize)]
struct TomlDeckHeader {
    subject: String,
    #[serde(default)]
    name: Option<String>,
    /// Default source document for every card in the deck.
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlCard {
    #[serde(default)]
    kind: Option<String>,
    question: String,
    answer: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    page: Option<u32>,
}

/// A parsed deck: cards for one subject, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub subject: SubjectId,
    pub name: String,
    pub cards: Vec<NewCard>,
}

/// Parse a single TOML file into a `Deck`.
pub fn parse_deck(path: &Path) -> Result<Deck> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read deck file: {}", path.display()))?;

    parse_deck_str(&content, path)
}

/// Parse a TOML string into a `Deck` (useful for testing).
pub fn parse_deck_str(content: &str, source_path: &Path) -> Result<Deck> {
    let parsed: TomlDeckFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let subject = SubjectId::from(parsed.deck.subject.trim());
    if subject.as_str().is_empty() {
        anyhow::bail!("deck subject is empty: {}", source_path.display());
    }

    let name = parsed.deck.name.unwrap_or_else(|| {
        source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| subject.to_string())
    });
    let default_source = parsed.deck.source;

    let cards = parsed
        .cards
        .into_iter()
        .enumerate()
        .map(|(i, c)| -> Result<NewCard> {
            let kind = match c.kind {
                Some(k) => k
                    .parse::<CardKind>()
                    .map_err(|e| anyhow::anyhow!("card {}: {}", i + 1, e))?,
                None if c.options.is_some() => CardKind::MultipleChoice,
                None => CardKind::Flashcard,
            };
            let source = c
                .source
                .or_else(|| default_source.clone())
                .map(|document| CardSource {
                    document,
                    page: c.page,
                });

            Ok(NewCard {
                subject_id: subject.clone(),
                kind,
                question: c.question,
                answer: c.answer,
                options: c.options,
                source,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Deck {
        subject,
        name,
        cards,
    })
}

/// Recursively load all `.toml` deck files from a directory.
pub fn load_deck_directory(dir: &Path) -> Result<Vec<Deck>> {
    let mut decks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            decks.extend(load_deck_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_deck(&path) {
                Ok(deck) => decks.push(deck),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(decks)
}

/// Load a deck file, or every deck under a directory.
pub fn load_decks(path: &Path) -> Result<Vec<Deck>> {
    if path.is_dir() {
        load_deck_directory(path)
    } else {
        Ok(vec![parse_deck(path)?])
    }
}

/// A warning from deck validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// 1-based position of the card in its deck (if applicable).
    pub card_index: Option<usize>,
    pub message: String,
}

/// Validate a deck for common authoring mistakes.
pub fn validate_deck(deck: &Deck) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if deck.cards.is_empty() {
        warnings.push(ValidationWarning {
            card_index: None,
            message: "deck has no cards".into(),
        });
    }

    let mut seen_questions = HashSet::new();
    for (i, card) in deck.cards.iter().enumerate() {
        let index = Some(i + 1);
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                card_index: index,
                message,
            })
        };

        if card.question.trim().is_empty() {
            warn("question is empty".into());
        } else if !seen_questions.insert(card.question.trim().to_lowercase()) {
            warn(format!("duplicate question: {}", card.question.trim()));
        }

        if card.answer.trim().is_empty() {
            warn("answer is empty".into());
        }

        match (&card.kind, &card.options) {
            (CardKind::MultipleChoice, None) => {
                warn("multiple_choice card has no options".into());
            }
            (CardKind::MultipleChoice, Some(options)) => {
                if options.len() < 2 {
                    warn("multiple_choice card needs at least two options".into());
                }
                if !options.iter().any(|o| o.trim() == card.answer.trim()) {
                    warn(format!("answer '{}' is not one of the options", card.answer));
                }
            }
            (kind, Some(_)) => {
                warn(format!("options are ignored for {kind} cards"));
            }
            (_, None) => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[deck]
subject = "Biology"
name = "Cell biology"
source = "cell-biology.pdf"

[[cards]]
kind = "short_answer"
question = "What is the powerhouse of the cell?"
answer = "Mitochondria"
page = 3

[[cards]]
question = "Which organelle makes proteins?"
answer = "Ribosome"
options = ["Ribosome", "Lysosome", "Vacuole"]
"#;

    #[test]
    fn parse_valid_toml() {
        let deck = parse_deck_str(VALID_TOML, &PathBuf::from("bio.toml")).unwrap();
        assert_eq!(deck.subject.as_str(), "Biology");
        assert_eq!(deck.name, "Cell biology");
        assert_eq!(deck.cards.len(), 2);
        assert_eq!(deck.cards[0].kind, CardKind::ShortAnswer);
        let source = deck.cards[0].source.as_ref().unwrap();
        assert_eq!(source.document, "cell-biology.pdf");
        assert_eq!(source.page, Some(3));
        // Options without a kind imply multiple choice.
        assert_eq!(deck.cards[1].kind, CardKind::MultipleChoice);
        assert!(validate_deck(&deck).is_empty());
    }

    #[test]
    fn parse_missing_optional_fields() {
        let toml = r#"
[deck]
subject = "History"

[[cards]]
question = "Year of the Battle of Hastings?"
answer = "1066"
"#;
        let deck = parse_deck_str(toml, &PathBuf::from("hastings.toml")).unwrap();
        assert_eq!(deck.name, "hastings");
        assert_eq!(deck.cards[0].kind, CardKind::Flashcard);
        assert!(deck.cards[0].source.is_none());
    }

    #[test]
    fn unknown_kind_is_error() {
        let toml = r#"
[deck]
subject = "History"

[[cards]]
kind = "essay"
question = "q"
answer = "a"
"#;
        let err = parse_deck_str(toml, &PathBuf::from("bad.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("unknown card kind"));
    }

    #[test]
    fn empty_subject_is_error() {
        let toml = "[deck]\nsubject = \"  \"\n";
        assert!(parse_deck_str(toml, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_flags_authoring_mistakes() {
        let toml = r#"
[deck]
subject = "Geography"

[[cards]]
question = "Capital of France?"
answer = "Paris"

[[cards]]
question = "capital of france?"
answer = ""

[[cards]]
kind = "mcq"
question = "Largest ocean?"
answer = "Pacific"
options = ["Atlantic", "Indian"]

[[cards]]
kind = "multiple_choice"
question = "Longest river?"
answer = "Nile"
"#;
        let deck = parse_deck_str(toml, &PathBuf::from("geo.toml")).unwrap();
        let warnings = validate_deck(&deck);
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate question")));
        assert!(messages.iter().any(|m| m.contains("answer is empty")));
        assert!(messages.iter().any(|m| m.contains("not one of the options")));
        assert!(messages.iter().any(|m| m.contains("has no options")));
        assert!(warnings.iter().all(|w| w.card_index.is_some()));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_deck_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bio.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not toml [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let decks = load_deck_directory(dir.path()).unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(decks[0].subject.as_str(), "Biology");

        let single = load_decks(&dir.path().join("bio.toml")).unwrap();
        assert_eq!(single.len(), 1);
    }
}
