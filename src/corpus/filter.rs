// Content-word eligibility — which annotated tokens become observations.
//
// The POS selection is an explicit value (a set of universal POS tags) passed
// in by the caller. It says nothing about where results are written; exporters
// derive a label from it when they need one.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use stop_words::{get, LANGUAGE};

use super::models::AnnotatedToken;

/// Universal POS tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    X,
}

impl Pos {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pos::Adj => "ADJ",
            Pos::Adp => "ADP",
            Pos::Adv => "ADV",
            Pos::Aux => "AUX",
            Pos::Cconj => "CCONJ",
            Pos::Det => "DET",
            Pos::Intj => "INTJ",
            Pos::Noun => "NOUN",
            Pos::Num => "NUM",
            Pos::Part => "PART",
            Pos::Pron => "PRON",
            Pos::Propn => "PROPN",
            Pos::Punct => "PUNCT",
            Pos::Sconj => "SCONJ",
            Pos::Sym => "SYM",
            Pos::Verb => "VERB",
            Pos::X => "X",
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pos {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let pos = match s.trim().to_ascii_uppercase().as_str() {
            "ADJ" => Pos::Adj,
            "ADP" => Pos::Adp,
            "ADV" => Pos::Adv,
            "AUX" => Pos::Aux,
            "CCONJ" => Pos::Cconj,
            "DET" => Pos::Det,
            "INTJ" => Pos::Intj,
            "NOUN" => Pos::Noun,
            "NUM" => Pos::Num,
            "PART" => Pos::Part,
            "PRON" => Pos::Pron,
            "PROPN" => Pos::Propn,
            "PUNCT" => Pos::Punct,
            "SCONJ" => Pos::Sconj,
            "SYM" => Pos::Sym,
            "VERB" => Pos::Verb,
            "X" => Pos::X,
            other => anyhow::bail!("Unknown POS tag: {other:?}"),
        };
        Ok(pos)
    }
}

/// The set of POS tags whose lemmas are eligible observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosFilter(BTreeSet<Pos>);

impl PosFilter {
    pub fn new(tags: impl IntoIterator<Item = Pos>) -> Result<Self> {
        let set: BTreeSet<Pos> = tags.into_iter().collect();
        if set.is_empty() {
            anyhow::bail!("POS filter must contain at least one tag");
        }
        Ok(Self(set))
    }

    /// The four content-word classes together.
    pub fn content_words() -> Self {
        Self([Pos::Noun, Pos::Adj, Pos::Verb, Pos::Adv].into_iter().collect())
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.0.contains(&pos)
    }

    /// Whether an annotator tag string is selected. Unknown tags never are.
    pub fn matches_tag(&self, tag: &str) -> bool {
        tag.parse::<Pos>().is_ok_and(|p| self.contains(p))
    }

    pub fn tags(&self) -> impl Iterator<Item = Pos> + '_ {
        self.0.iter().copied()
    }

    /// Compact label for file and table names, e.g. `ADJADV`.
    pub fn label(&self) -> String {
        self.tags().map(|p| p.as_str()).collect()
    }
}

impl fmt::Display for PosFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags().map(|p| p.as_str()).collect();
        f.write_str(&tags.join(", "))
    }
}

impl FromStr for PosFilter {
    type Err = anyhow::Error;

    /// Parse `"NOUN, VERB"` / `"adj,adv"` style lists.
    fn from_str(s: &str) -> Result<Self> {
        let tags = s
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(Pos::from_str)
            .collect::<Result<Vec<_>>>()?;
        Self::new(tags)
    }
}

/// Decides which tokens are content words and yields their normalized lemma.
///
/// A token qualifies when its POS tag is selected, its surface form is
/// alphabetic, it is not a stop word and its lemma is non-empty. Annotator
/// flags win over the built-in checks when present.
pub struct ContentFilter {
    pos: PosFilter,
    stop_words: HashSet<String>,
}

impl ContentFilter {
    /// Filter with the German stop-word list.
    pub fn new(pos: PosFilter) -> Self {
        let stop_words: Vec<String> = get(LANGUAGE::German);
        Self::with_stop_words(pos, stop_words)
    }

    pub fn with_stop_words(pos: PosFilter, stop_words: impl IntoIterator<Item = String>) -> Self {
        Self {
            pos,
            stop_words: stop_words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn pos_filter(&self) -> &PosFilter {
        &self.pos
    }

    /// The lowercased lemma when the token is eligible.
    pub fn eligible_lemma(&self, token: &AnnotatedToken) -> Option<String> {
        if !self.pos.matches_tag(&token.pos) {
            return None;
        }

        let is_alpha = token
            .is_alpha
            .unwrap_or_else(|| !token.text.is_empty() && token.text.chars().all(char::is_alphabetic));
        if !is_alpha {
            return None;
        }

        let is_stop = token
            .is_stop
            .unwrap_or_else(|| self.stop_words.contains(&token.text.to_lowercase()));
        if is_stop {
            return None;
        }

        let lemma = token.lemma.trim().to_lowercase();
        if lemma.is_empty() {
            None
        } else {
            Some(lemma)
        }
    }

    /// Positions and lemmas of all eligible tokens in a text.
    pub fn select(&self, tokens: &[AnnotatedToken]) -> Vec<(usize, String)> {
        tokens
            .iter()
            .enumerate()
            .filter_map(|(i, t)| self.eligible_lemma(t).map(|lemma| (i, lemma)))
            .collect()
    }
}
