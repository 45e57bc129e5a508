use crate::corpus::Corpus;
use crate::settings::{Language, PracticeMode, PracticeSettings};
use crate::transport::{TextItem, TextSource};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

/// How often a weak character is repeated in its drill line
pub const WEAK_CHAR_REPEAT: usize = 5;

/// Builds the ordered item queue for one session.
///
/// Server texts are preferred for sentence based modes; everything else comes
/// from the built-in corpus. Timed modes always get a single item.
pub fn build_queue<R: Rng + ?Sized>(
    settings: &PracticeSettings,
    supplied: &[TextItem],
    rng: &mut R,
) -> Vec<String> {
    let corpus = Corpus::builtin(settings.language());
    let supplied: Vec<String> = supplied
        .iter()
        .map(|item| item.content.trim())
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .collect();

    let mut pool = match settings.mode() {
        PracticeMode::WeaknessDrill { weak_chars, .. } if !weak_chars.is_empty() => {
            let sentences = if supplied.is_empty() {
                &corpus.sentences
            } else {
                &supplied
            };
            weakness_pool(weak_chars, sentences)
        }
        PracticeMode::Sentence { .. }
        | PracticeMode::TimeAttack { .. }
        | PracticeMode::AccuracyChallenge { .. }
            if !supplied.is_empty() =>
        {
            supplied
        }
        PracticeMode::KorDrill { .. } => match &corpus.drills {
            Some(drills) => drills.all(),
            None => corpus.sentences.clone(),
        },
        PracticeMode::Word { .. } => corpus.words.clone(),
        PracticeMode::Sentence { .. }
        | PracticeMode::TimeAttack { .. }
        | PracticeMode::AccuracyChallenge { .. }
        | PracticeMode::WeaknessDrill { .. } => corpus.sentences.clone(),
    };

    pool.shuffle(rng);
    pool.truncate(queue_len(settings.mode()));
    debug!(mode = %settings.kind(), items = pool.len(), "built item queue");
    pool
}

fn queue_len(mode: &PracticeMode) -> usize {
    mode.items_per_session().unwrap_or(1).max(1)
}

/// Repetition drills for each weak character followed by the sentences that
/// contain any of them
fn weakness_pool(weak_chars: &[char], sentences: &[String]) -> Vec<String> {
    let drills = weak_chars.iter().map(|c| repeat_drill(*c));
    let prioritized = sentences
        .iter()
        .filter(|s| s.chars().any(|c| weak_chars.contains(&c)))
        .cloned();
    drills.chain(prioritized).collect()
}

fn repeat_drill(c: char) -> String {
    vec![c.to_string(); WEAK_CHAR_REPEAT].join(" ")
}

/// Fetches server texts for `language`, or nothing when the server cannot
/// provide them so that the built-in corpus is used instead.
pub async fn load_text_items<S: TextSource>(source: &S, language: Language) -> Vec<TextItem> {
    match source.fetch_items(language).await {
        Ok(items) => {
            debug!(%language, count = items.len(), "loaded server texts");
            items
        }
        Err(err) => {
            warn!(%language, error = %err, "failed to load server texts, using built-in corpus");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ModeKind;
    use crate::transport::TransportError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn settings(kind: ModeKind, language: Language) -> PracticeSettings {
        PracticeSettings::new(PracticeMode::defaults_for(kind), language)
    }

    fn server_items() -> Vec<TextItem> {
        (0..8)
            .map(|i| TextItem::new(format!("server sentence {i}"), i))
            .collect()
    }

    #[test]
    fn sentence_mode_prefers_server_texts() {
        let queue = build_queue(
            &settings(ModeKind::Sentence, Language::English),
            &server_items(),
            &mut rng(),
        );
        assert_eq!(queue.len(), 5);
        assert!(queue.iter().all(|s| s.starts_with("server sentence")));
    }

    #[test]
    fn sentence_mode_falls_back_to_corpus() {
        let corpus = Corpus::builtin(Language::English);
        let queue = build_queue(
            &settings(ModeKind::Sentence, Language::English),
            &[],
            &mut rng(),
        );
        assert_eq!(queue.len(), 5);
        assert!(queue.iter().all(|s| corpus.sentences.contains(s)));
    }

    #[test]
    fn blank_server_texts_are_ignored() {
        let queue = build_queue(
            &settings(ModeKind::Sentence, Language::Korean),
            &[TextItem::new("   ", 0)],
            &mut rng(),
        );
        let corpus = Corpus::builtin(Language::Korean);
        assert!(queue.iter().all(|s| corpus.sentences.contains(s)));
    }

    #[test]
    fn timed_modes_get_a_single_item() {
        for kind in [ModeKind::TimeAttack, ModeKind::AccuracyChallenge] {
            let queue = build_queue(&settings(kind, Language::English), &server_items(), &mut rng());
            assert_eq!(queue.len(), 1);
            assert!(queue[0].starts_with("server sentence"));
        }
    }

    #[test]
    fn word_mode_uses_word_list() {
        let mut settings = settings(ModeKind::Word, Language::English);
        settings.set_items_per_session(10);
        let corpus = Corpus::builtin(Language::English);

        let queue = build_queue(&settings, &server_items(), &mut rng());
        assert_eq!(queue.len(), 10);
        assert!(queue.iter().all(|w| corpus.words.contains(w)));
    }

    #[test]
    fn kor_drill_uses_drills() {
        let mut settings = settings(ModeKind::KorDrill, Language::Korean);
        settings.set_items_per_session(100);
        let queue = build_queue(&settings, &[], &mut rng());
        // every drill, shuffled
        assert_eq!(queue.len(), 23);
        assert!(queue.contains(&"닭 삶 값 없 읽 넓 짧 앓".to_string()));
    }

    #[test]
    fn weakness_drill_mixes_repetitions_and_matching_sentences() {
        let settings = PracticeSettings::new(
            PracticeMode::WeaknessDrill {
                items_per_session: 50,
                weak_chars: vec!['z', 'q'],
            },
            Language::English,
        );
        let mut queue = build_queue(&settings, &[], &mut rng());
        queue.sort();

        assert_eq!(
            queue,
            vec![
                "Learning to type fast requires patience and dedication.".to_string(),
                "The quick brown fox jumps over the lazy dog.".to_string(),
                "q q q q q".to_string(),
                "z z z z z".to_string(),
            ]
        );
    }

    #[test]
    fn weakness_drill_without_weak_chars_practices_sentences() {
        let queue = build_queue(
            &settings(ModeKind::WeaknessDrill, Language::English),
            &server_items(),
            &mut rng(),
        );
        let corpus = Corpus::builtin(Language::English);
        assert_eq!(queue.len(), 5);
        assert!(queue.iter().all(|s| corpus.sentences.contains(s)));
    }

    #[test]
    fn repeat_drill_format() {
        assert_eq!(repeat_drill('ㄱ'), "ㄱ ㄱ ㄱ ㄱ ㄱ");
    }

    struct FailingSource;

    impl TextSource for FailingSource {
        async fn fetch_items(&self, _language: Language) -> Result<Vec<TextItem>, TransportError> {
            Err(TransportError::Status {
                status: 503,
                detail: "down".into(),
            })
        }
    }

    struct FixedSource(Vec<TextItem>);

    impl TextSource for FixedSource {
        async fn fetch_items(&self, _language: Language) -> Result<Vec<TextItem>, TransportError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn load_text_items_swallows_failures() {
        assert!(load_text_items(&FailingSource, Language::Korean)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn load_text_items_passes_through_items() {
        let source = FixedSource(server_items());
        assert_eq!(load_text_items(&source, Language::English).await.len(), 8);
    }
}
