//! Stopword lists compiled into the binary.
//!
//! Only Portuguese is bundled; it is the standard NLTK `portuguese` list.
//! Configuration may add extra words or disable filtering with `"none"`.

use std::collections::HashSet;

/// Language names accepted by `retrieval.stopwords`.
pub const SUPPORTED_LANGUAGES: &[&str] = &["portuguese", "none"];

pub const PORTUGUESE: &[&str] = &[
    "a", "à", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "às", "até",
    "com", "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do", "dos",
    "e", "é", "ela", "elas", "ele", "eles", "em", "entre", "era", "eram", "éramos", "essa",
    "essas", "esse", "esses", "esta", "está", "estamos", "estão", "estar", "estas", "estava",
    "estavam", "estávamos", "este", "esteja", "estejam", "estejamos", "estes", "esteve",
    "estive", "estivemos", "estiver", "estivera", "estiveram", "estivéramos", "estiverem",
    "estivermos", "estivesse", "estivessem", "estivéssemos", "estou", "eu", "foi", "fomos",
    "for", "fora", "foram", "fôramos", "forem", "formos", "fosse", "fossem", "fôssemos", "fui",
    "há", "haja", "hajam", "hajamos", "hão", "havemos", "haver", "hei", "houve", "houvemos",
    "houver", "houvera", "houverá", "houveram", "houvéramos", "houverão", "houverei",
    "houverem", "houveremos", "houveria", "houveriam", "houveríamos", "houvermos", "houvesse",
    "houvessem", "houvéssemos", "isso", "isto", "já", "lhe", "lhes", "mais", "mas", "me",
    "mesmo", "meu", "meus", "minha", "minhas", "muito", "na", "não", "nas", "nem", "no", "nos",
    "nós", "nossa", "nossas", "nosso", "nossos", "num", "numa", "o", "os", "ou", "para", "pela",
    "pelas", "pelo", "pelos", "por", "qual", "quando", "que", "quem", "são", "se", "seja",
    "sejam", "sejamos", "sem", "ser", "será", "serão", "serei", "seremos", "seria", "seriam",
    "seríamos", "seu", "seus", "só", "somos", "sou", "sua", "suas", "também", "te", "tem", "tém",
    "temos", "tenha", "tenham", "tenhamos", "tenho", "terá", "terão", "terei", "teremos",
    "teria", "teriam", "teríamos", "teu", "teus", "teve", "tinha", "tinham", "tínhamos", "tive",
    "tivemos", "tiver", "tivera", "tiveram", "tivéramos", "tiverem", "tivermos", "tivesse",
    "tivessem", "tivéssemos", "tu", "tua", "tuas", "um", "uma", "você", "vocês", "vos",
];

/// Words for a language name, or `None` when the language is unknown.
/// `"none"` maps to an empty list.
pub fn for_language(language: &str) -> Option<&'static [&'static str]> {
    match language {
        "portuguese" => Some(PORTUGUESE),
        "none" => Some(&[]),
        _ => None,
    }
}

/// Build the lowercase stopword set for `language` plus `extra` words.
/// Unknown languages contribute no words; config validation rejects them
/// before this is reached.
pub fn build_set(language: &str, extra: &[String]) -> HashSet<String> {
    let mut set: HashSet<String> = for_language(language)
        .unwrap_or_default()
        .iter()
        .map(|w| w.to_string())
        .collect();
    set.extend(extra.iter().map(|w| w.trim().to_lowercase()));
    set
}
