//! Lookahead buffer of upcoming questions
//!
//! Every question in the buffer has had its narration handed to
//! [`TieredAudioCache::preload`], so by the time it is asked the audio is
//! usually already in memory. Preloading is fire-and-forget; a failed
//! preload only means the question is narrated by the speech fallback.

use crate::cache::TieredAudioCache;
use mqz_common::question::{Question, QuestionSource};
use std::collections::VecDeque;
use tracing::debug;

/// Upcoming questions for one quiz session.
pub struct SessionPrefetchBuffer {
    source: Box<dyn QuestionSource>,
    cache: TieredAudioCache,
    lang: String,
    lookahead: usize,
    length: usize,
    queue: VecDeque<Question>,
    /// Index of the next question not yet generated
    next_index: usize,
    /// Questions handed out by `advance`
    served: usize,
}

impl SessionPrefetchBuffer {
    pub fn new(
        source: Box<dyn QuestionSource>,
        cache: TieredAudioCache,
        lang: impl Into<String>,
        lookahead: usize,
        length: usize,
    ) -> Self {
        Self {
            source,
            cache,
            lang: lang.into(),
            lookahead,
            length,
            queue: VecDeque::new(),
            next_index: 0,
            served: 0,
        }
    }

    /// Fill the initial lookahead. Call once at session start.
    pub fn prime(&mut self) {
        while self.queue.len() < self.lookahead && self.next_index < self.length {
            self.enqueue_next();
        }
        debug!("Primed {} questions", self.queue.len());
    }

    /// Buffer one more question after a correct answer.
    ///
    /// Nothing is buffered past the end of the session.
    pub fn on_correct_answer(&mut self) {
        if self.next_index < self.length {
            self.enqueue_next();
        }
    }

    /// Next question to ask.
    ///
    /// With an empty buffer a question is generated on the spot and its
    /// narration preload starts immediately.
    pub fn advance(&mut self) -> Question {
        let question = match self.queue.pop_front() {
            Some(question) => question,
            None => {
                debug!("Prefetch buffer empty, generating question {}", self.served);
                let question = self.source.next_question();
                self.preload(&question);
                self.next_index = self.next_index.max(self.served + 1);
                question
            }
        };
        self.served += 1;
        question
    }

    /// Questions currently buffered, head first
    pub fn upcoming(&self) -> impl Iterator<Item = &Question> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Index the next buffered question will get
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn served(&self) -> usize {
        self.served
    }

    pub fn session_length(&self) -> usize {
        self.length
    }

    fn enqueue_next(&mut self) {
        let question = self.source.next_question();
        debug!("Buffered question {}: {}", self.next_index, question);
        self.preload(&question);
        self.queue.push_back(question);
        self.next_index += 1;
    }

    fn preload(&self, question: &Question) {
        let static_id = question.static_asset_id();
        self.cache
            .preload(&question.audio_text(), &self.lang, static_id.as_deref());
    }
}
