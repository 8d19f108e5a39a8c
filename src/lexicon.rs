//! Rule-based sentence splitting, part-of-speech tagging and lemmatization.
//!
//! Works over words an upstream tokenizer already produced. Tags follow the
//! Penn Treebank set. Lemmas come from an irregular-form table, then from
//! WordNet-style suffix rules chosen by the tag.

use crate::models::Span;

/// Closed-class words and their fixed tags.
const CLOSED_CLASS: &[(&str, &str)] = &[
    ("who", "WP"),
    ("whom", "WP"),
    ("what", "WP"),
    ("whose", "WP$"),
    ("which", "WDT"),
    ("where", "WRB"),
    ("when", "WRB"),
    ("why", "WRB"),
    ("how", "WRB"),
    ("the", "DT"),
    ("a", "DT"),
    ("an", "DT"),
    ("this", "DT"),
    ("that", "DT"),
    ("these", "DT"),
    ("those", "DT"),
    ("each", "DT"),
    ("every", "DT"),
    ("some", "DT"),
    ("any", "DT"),
    ("no", "DT"),
    ("all", "DT"),
    ("i", "PRP"),
    ("you", "PRP"),
    ("he", "PRP"),
    ("she", "PRP"),
    ("it", "PRP"),
    ("we", "PRP"),
    ("they", "PRP"),
    ("me", "PRP"),
    ("him", "PRP"),
    ("her", "PRP"),
    ("us", "PRP"),
    ("them", "PRP"),
    ("my", "PRP$"),
    ("your", "PRP$"),
    ("his", "PRP$"),
    ("its", "PRP$"),
    ("our", "PRP$"),
    ("their", "PRP$"),
    ("in", "IN"),
    ("on", "IN"),
    ("at", "IN"),
    ("by", "IN"),
    ("of", "IN"),
    ("for", "IN"),
    ("with", "IN"),
    ("from", "IN"),
    ("about", "IN"),
    ("into", "IN"),
    ("over", "IN"),
    ("under", "IN"),
    ("after", "IN"),
    ("before", "IN"),
    ("during", "IN"),
    ("around", "IN"),
    ("between", "IN"),
    ("through", "IN"),
    ("against", "IN"),
    ("without", "IN"),
    ("to", "TO"),
    ("and", "CC"),
    ("or", "CC"),
    ("but", "CC"),
    ("nor", "CC"),
    ("will", "MD"),
    ("would", "MD"),
    ("can", "MD"),
    ("could", "MD"),
    ("shall", "MD"),
    ("should", "MD"),
    ("may", "MD"),
    ("might", "MD"),
    ("must", "MD"),
    ("not", "RB"),
    ("n't", "RB"),
    ("there", "EX"),
    ("'s", "POS"),
];

/// Irregular verb forms as `(form, lemma, tag)`.
const IRREGULAR_VERBS: &[(&str, &str, &str)] = &[
    ("is", "be", "VBZ"),
    ("are", "be", "VBP"),
    ("am", "be", "VBP"),
    ("was", "be", "VBD"),
    ("were", "be", "VBD"),
    ("be", "be", "VB"),
    ("been", "be", "VBN"),
    ("being", "be", "VBG"),
    ("do", "do", "VBP"),
    ("does", "do", "VBZ"),
    ("did", "do", "VBD"),
    ("done", "do", "VBN"),
    ("has", "have", "VBZ"),
    ("have", "have", "VBP"),
    ("had", "have", "VBD"),
    ("having", "have", "VBG"),
    ("wrote", "write", "VBD"),
    ("written", "write", "VBN"),
    ("went", "go", "VBD"),
    ("gone", "go", "VBN"),
    ("made", "make", "VBD"),
    ("said", "say", "VBD"),
    ("took", "take", "VBD"),
    ("taken", "take", "VBN"),
    ("came", "come", "VBD"),
    ("saw", "see", "VBD"),
    ("seen", "see", "VBN"),
    ("knew", "know", "VBD"),
    ("known", "know", "VBN"),
    ("got", "get", "VBD"),
    ("gave", "give", "VBD"),
    ("given", "give", "VBN"),
    ("found", "find", "VBD"),
    ("thought", "think", "VBD"),
    ("told", "tell", "VBD"),
    ("became", "become", "VBD"),
    ("left", "leave", "VBD"),
    ("felt", "feel", "VBD"),
    ("brought", "bring", "VBD"),
    ("began", "begin", "VBD"),
    ("begun", "begin", "VBN"),
    ("kept", "keep", "VBD"),
    ("held", "hold", "VBD"),
    ("stood", "stand", "VBD"),
    ("heard", "hear", "VBD"),
    ("met", "meet", "VBD"),
    ("ran", "run", "VBD"),
    ("paid", "pay", "VBD"),
    ("sat", "sit", "VBD"),
    ("spoke", "speak", "VBD"),
    ("spoken", "speak", "VBN"),
    ("led", "lead", "VBD"),
    ("grew", "grow", "VBD"),
    ("grown", "grow", "VBN"),
    ("lost", "lose", "VBD"),
    ("fell", "fall", "VBD"),
    ("fallen", "fall", "VBN"),
    ("sent", "send", "VBD"),
    ("built", "build", "VBD"),
    ("drew", "draw", "VBD"),
    ("drawn", "draw", "VBN"),
    ("broke", "break", "VBD"),
    ("broken", "break", "VBN"),
    ("won", "win", "VBD"),
    ("taught", "teach", "VBD"),
    ("bought", "buy", "VBD"),
    ("caught", "catch", "VBD"),
    ("fought", "fight", "VBD"),
    ("sold", "sell", "VBD"),
    ("chose", "choose", "VBD"),
    ("chosen", "choose", "VBN"),
    ("drove", "drive", "VBD"),
    ("driven", "drive", "VBN"),
    ("ate", "eat", "VBD"),
    ("eaten", "eat", "VBN"),
    ("flew", "fly", "VBD"),
    ("sang", "sing", "VBD"),
    ("sung", "sing", "VBN"),
];

const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("people", "person"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
];

/// Part-of-speech tag and lemma of one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub pos: String,
    pub lemma: String,
}

/// Splits `text` into sentences at tokens made only of `.`, `!` or `?`.
///
/// Closing quotes and brackets right after the terminator stay with the
/// sentence they close. Text without tokens is one trimmed sentence.
pub fn sentence_spans(text: &str, tokens: &[Span]) -> Vec<Span> {
    if tokens.is_empty() {
        let begin = text.len() - text.trim_start().len();
        let end = text.trim_end().len().max(begin);
        return vec![Span::new(begin, end)];
    }

    let mut sentences = Vec::new();
    let mut open: Option<Span> = None;
    let mut terminated = false;

    for token in tokens {
        let word = text.get(token.begin..token.end).unwrap_or_default();
        if terminated && !is_closer(word) {
            sentences.extend(open.take());
            terminated = false;
        }
        open = Some(match open {
            Some(sentence) => sentence.cover(token),
            None => *token,
        });
        if is_terminal(word) {
            terminated = true;
        }
    }
    sentences.extend(open);

    sentences
}

/// Tags each word and finds its lemma.
///
/// `predicates[i]` marks words a role labeler found to be predicates; they are
/// tagged as verbs even when the word alone looks like a noun.
///
/// # Examples
///
/// ```
/// use qapipe::lexicon::tag_words;
///
/// let tagged = tag_words(&["Who", "wrote", "Hamlet", "?"], &[false, true, false, false]);
/// let pos: Vec<&str> = tagged.iter().map(|t| t.pos.as_str()).collect();
///
/// assert_eq!(pos, vec!["WP", "VBD", "NNP", "."]);
/// assert_eq!(tagged[1].lemma, "write");
/// ```
pub fn tag_words(words: &[&str], predicates: &[bool]) -> Vec<Tagged> {
    let mut tagged = Vec::with_capacity(words.len());
    // Set after a modal, `to` or a form of `do`: the next verb is a base form.
    let mut expects_base = false;

    for (i, word) in words.iter().enumerate() {
        let is_predicate = predicates.get(i).copied().unwrap_or(false);
        let pos = pos_tag(word, is_predicate, expects_base);

        if pos == "MD" || pos == "TO" || lemma_of_irregular(word) == Some("do") {
            expects_base = true;
        } else if pos.starts_with("VB") {
            expects_base = false;
        }

        let lemma = lemmatize(word, pos);
        tagged.push(Tagged {
            pos: pos.to_string(),
            lemma,
        });
    }

    tagged
}

/// Lemma of `word` read as part of speech `pos`.
pub fn lemmatize(word: &str, pos: &str) -> String {
    if pos.starts_with("NNP") || is_punctuation(word) {
        return word.to_string();
    }

    let lower = word.to_lowercase();
    if pos.starts_with("VB") {
        if let Some(lemma) = lemma_of_irregular(&lower) {
            return lemma.to_string();
        }
        return verb_stem(&lower);
    }
    if pos == "NNS" {
        if let Some((_, lemma)) = IRREGULAR_NOUNS.iter().find(|(form, _)| *form == lower) {
            return lemma.to_string();
        }
        return noun_stem(&lower);
    }
    lower
}

fn pos_tag(word: &str, is_predicate: bool, expects_base: bool) -> &'static str {
    if is_punctuation(word) {
        return punctuation_tag(word);
    }
    if is_number(word) {
        return "CD";
    }

    let lower = word.to_lowercase();
    if let Some((_, tag)) = CLOSED_CLASS.iter().find(|(form, _)| *form == lower) {
        return *tag;
    }
    if let Some((_, _, tag)) = IRREGULAR_VERBS.iter().find(|(form, _, _)| *form == lower) {
        return *tag;
    }
    if is_predicate {
        return verb_tag(&lower, expects_base);
    }
    if word.chars().next().is_some_and(char::is_uppercase) {
        return "NNP";
    }
    if IRREGULAR_NOUNS.iter().any(|(form, _)| *form == lower) {
        return "NNS";
    }

    let len = lower.len();
    if lower.ends_with("ly") && len > 4 {
        "RB"
    } else if lower.ends_with("ing") && len > 4 {
        "VBG"
    } else if lower.ends_with("ed") && len > 3 {
        "VBN"
    } else if is_plural_form(&lower) {
        "NNS"
    } else {
        "NN"
    }
}

fn verb_tag(lower: &str, expects_base: bool) -> &'static str {
    if lower.ends_with("ing") {
        "VBG"
    } else if lower.ends_with("ed") {
        "VBD"
    } else if expects_base {
        "VB"
    } else if lower.ends_with('s') && !lower.ends_with("ss") {
        "VBZ"
    } else {
        "VBP"
    }
}

fn lemma_of_irregular(word: &str) -> Option<&'static str> {
    let lower = word.to_lowercase();
    IRREGULAR_VERBS
        .iter()
        .find(|(form, _, _)| *form == lower)
        .map(|(_, lemma, _)| *lemma)
}

fn verb_stem(word: &str) -> String {
    for suffix in ["ies", "ied"] {
        if let Some(stem) = word.strip_suffix(suffix)
            && stem.len() >= 2
        {
            return format!("{stem}y");
        }
    }
    for suffix in ["ing", "ed"] {
        if let Some(stem) = word.strip_suffix(suffix)
            && stem.chars().count() >= 2
            && stem.chars().any(is_vowel)
        {
            return restore_stem(stem);
        }
    }
    if let Some(stem) = word.strip_suffix("es")
        && ["ch", "sh", "ss", "x", "z", "o"].iter().any(|end| stem.ends_with(end))
    {
        return stem.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !word.ends_with("ss") => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Undoes consonant doubling (`stopp`) or restores a silent `e` (`writ`).
fn restore_stem(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();
    let last = chars[n - 1];

    if n >= 4 && last == chars[n - 2] && !is_vowel(last) && !matches!(last, 'l' | 's' | 'z' | 'f') {
        return chars[..n - 1].iter().collect();
    }

    let vowels = chars.iter().filter(|c| is_vowel(**c)).count();
    let silent_e = matches!(last, 'v' | 'c')
        || (vowels == 1
            && n <= 4
            && !is_vowel(last)
            && !matches!(last, 'w' | 'x' | 'y')
            && is_vowel(chars[n - 2]));

    if silent_e {
        format!("{stem}e")
    } else {
        stem.to_string()
    }
}

fn noun_stem(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies")
        && stem.len() >= 2
    {
        return format!("{stem}y");
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if is_plural_form(word) {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn is_plural_form(lower: &str) -> bool {
    lower.len() > 3
        && lower.ends_with('s')
        && !["ss", "us", "is"].iter().any(|end| lower.ends_with(end))
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn is_punctuation(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| !c.is_alphanumeric())
}

fn is_terminal(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| matches!(c, '.' | '!' | '?'))
}

fn is_closer(word: &str) -> bool {
    matches!(word, "\"" | "''" | "'" | "\u{201d}" | ")" | "]")
}

fn is_number(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

fn punctuation_tag(word: &str) -> &'static str {
    if is_terminal(word) {
        return ".";
    }
    match word {
        "," => ",",
        ":" | ";" | "-" | "--" => ":",
        "(" | "[" | "{" => "(",
        ")" | "]" | "}" => ")",
        "\"" | "``" | "\u{201c}" => "``",
        "''" | "\u{201d}" => "''",
        "$" => "$",
        "#" => "#",
        _ => "SYM",
    }
}
