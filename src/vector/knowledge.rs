//! Keyword-boosted ranking for knowledge search.

use crate::config::KnowledgeConfig;
use crate::storage::{Document, ScoredDocument, get_path};

/// Combines vector similarity with a keyword multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordScorer {
    keyword_boost: f32,
    chunk_boost: f32,
    main_boost: f32,
    min_similarity: f32,
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::from(&KnowledgeConfig::default())
    }
}

impl From<&KnowledgeConfig> for KeywordScorer {
    fn from(config: &KnowledgeConfig) -> Self {
        Self {
            keyword_boost: config.keyword_boost,
            chunk_boost: config.chunk_boost,
            main_boost: config.main_boost,
            min_similarity: config.keyword_min_similarity,
        }
    }
}

/// A knowledge document with the scores that ranked it.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeMatch {
    pub document: Document,
    pub similarity: f32,
    pub multiplier: f32,
    /// `similarity * multiplier`
    pub score: f32,
}

impl KeywordScorer {
    /// Multiplier for one document given the caller's search text.
    pub fn multiplier(&self, search_text: Option<&str>, doc: &Document) -> f32 {
        let keyword = match search_text.map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let text = get_path(doc, "content.text").and_then(|v| v.as_str());
                let hit = text.is_some_and(|text| {
                    text.to_lowercase().contains(&needle.to_lowercase())
                });
                if hit { self.keyword_boost } else { 1.0 }
            }
            None => 1.0,
        };

        let flag = |path: &str| get_path(doc, path).and_then(|v| v.as_bool()) == Some(true);
        let structure = if flag("content.metadata.isChunk") {
            self.chunk_boost
        } else if flag("content.metadata.isMain") {
            self.main_boost
        } else {
            1.0
        };

        keyword * structure
    }

    /// Either similarity alone clears `threshold`, or a boosted document
    /// clears the lower keyword floor.
    pub fn qualifies(&self, similarity: f32, multiplier: f32, threshold: f32) -> bool {
        similarity >= threshold || (multiplier > 1.0 && similarity >= self.min_similarity)
    }

    /// Score, gate and order candidates, keeping at most `limit`.
    pub fn rank(
        &self,
        candidates: Vec<ScoredDocument>,
        search_text: Option<&str>,
        threshold: f32,
        limit: usize,
    ) -> Vec<KnowledgeMatch> {
        let mut matches: Vec<KnowledgeMatch> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let multiplier = self.multiplier(search_text, &candidate.document);
                self.qualifies(candidate.score, multiplier, threshold)
                    .then(|| KnowledgeMatch {
                        score: candidate.score * multiplier,
                        similarity: candidate.score,
                        multiplier,
                        document: candidate.document,
                    })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        matches
    }
}
