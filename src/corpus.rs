use crate::settings::Language;
use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;
use std::error::Error;

static CORPUS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/corpus");

/// Korean pattern drills, grouped by what they train
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Drills {
    pub batchim: Vec<String>,
    pub double_consonant: Vec<String>,
    pub spacing: Vec<String>,
    pub similar: Vec<String>,
}

impl Drills {
    pub fn all(&self) -> Vec<String> {
        self.batchim
            .iter()
            .chain(&self.double_consonant)
            .chain(&self.spacing)
            .chain(&self.similar)
            .cloned()
            .collect()
    }
}

/// Built-in practice texts used when no server texts are available
#[derive(Deserialize, Clone, Debug)]
pub struct Corpus {
    pub name: String,
    pub sentences: Vec<String>,
    pub words: Vec<String>,
    #[serde(default)]
    pub drills: Option<Drills>,
}

impl Corpus {
    pub fn builtin(language: Language) -> Self {
        read_corpus_from_file(format!("{language}.json"))
            .expect("built-in corpus files are embedded at compile time")
    }
}

fn read_corpus_from_file(file_name: String) -> Result<Corpus, Box<dyn Error>> {
    let file = CORPUS_DIR
        .get_file(&file_name)
        .ok_or_else(|| format!("corpus file not found: {file_name}"))?;

    let file_as_str = file
        .contents_utf8()
        .ok_or("unable to interpret corpus file as a string")?;

    Ok(from_str(file_as_str)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_korean_corpus() {
        let corpus = Corpus::builtin(Language::Korean);

        assert_eq!(corpus.name, "korean");
        assert_eq!(corpus.sentences.len(), 8);
        assert_eq!(corpus.words.len(), 24);
        let drills = corpus.drills.expect("korean has drills");
        assert_eq!(drills.batchim.len(), 6);
        assert_eq!(drills.similar.len(), 5);
        assert_eq!(drills.all().len(), 23);
    }

    #[test]
    fn test_english_corpus() {
        let corpus = Corpus::builtin(Language::English);

        assert_eq!(corpus.name, "english");
        assert!(corpus.sentences.contains(&"The quick brown fox jumps over the lazy dog.".to_string()));
        assert_eq!(corpus.words.len(), 24);
        assert!(corpus.drills.is_none());
    }

    #[test]
    fn test_corpus_deserialization() {
        let json_data = r#"
        {
            "name": "test",
            "sentences": ["one two"],
            "words": ["one", "two"]
        }
        "#;

        let corpus: Corpus = from_str(json_data).expect("Failed to deserialize test corpus");
        assert_eq!(corpus.words, vec!["one", "two"]);
        assert!(corpus.drills.is_none());
    }

    #[test]
    fn test_read_nonexistent_corpus_file() {
        assert!(read_corpus_from_file("klingon.json".to_string()).is_err());
    }
}
